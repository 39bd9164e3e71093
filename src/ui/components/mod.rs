mod command_input;
mod filter_bar;
mod form;
mod input;
mod status_picker;

pub use command_input::{CommandEvent, CommandInput};
pub use filter_bar::draw_filter_bar;
pub use form::{Form, FormEvent};
pub use status_picker::{StatusPicker, StatusPickerEvent};

/// How a component dealt with a key, for its parent view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, with an event for the parent
  Event(T),
  /// Not consumed, parent should try the next handler
  NotHandled,
}
