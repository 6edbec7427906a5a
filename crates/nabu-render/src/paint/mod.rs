//! Paint types.
//!
//! All colors are linear premultiplied RGBA, matching the premultiplied
//! blend state used for `BlendMode::Alpha`.

mod color;

pub use color::Color;
