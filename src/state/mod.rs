//! Client state engines.
//!
//! DESIGN
//! ======
//! Each engine owns its state behind `Rc<RefCell<_>>` and exposes it only
//! through operations. Views mirror snapshots into signals via listeners.

pub mod feed;
pub mod session;
