mod error;
mod model;
mod store;

pub use error::{GroupDecodeError, GroupError};
pub use model::{Group, GroupState, GroupUpdate, NewGroup};
pub use store::{GROUPS_TABLE, GroupStore};
