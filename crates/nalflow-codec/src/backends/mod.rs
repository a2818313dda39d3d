//! 内置解码引擎.

pub mod software;

#[cfg(feature = "openh264")]
pub mod openh264;

pub use software::{BlankPictureDecoder, PictureDecoder, SoftwareBackend, SoftwareSession};

#[cfg(feature = "openh264")]
pub use self::openh264::OpenH264PictureDecoder;
