pub mod event;
pub mod locator;
pub mod page;
pub mod selector;

pub use event::PageEvent;
pub use page::{Element, Observer, PageHandle};
pub use selector::SimpleSelector;

pub use ego_tree::NodeId;
