#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use handshape_linalg as linalg;

#[doc(inline)]
pub use handshape_icp as icp;

#[doc(inline)]
pub use handshape_pose as pose;
