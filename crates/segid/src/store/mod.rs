mod interface;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use interface::*;
pub use memory::*;
#[cfg_attr(docsrs, doc(cfg(feature = "mongodb")))]
#[cfg(feature = "mongodb")]
pub use mongo::*;
