//! Text processing between the executor stream and what users see.

pub mod input;
pub mod notices;
pub mod utf8_buffer;
pub mod warning_filter;

pub use input::rectify_input;
pub use utf8_buffer::Utf8Buffer;
pub use warning_filter::WarningFilter;
