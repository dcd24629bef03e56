//! Concrete event handlers registered with the dispatcher.
//!
//! Profiles run before notes so a note's `author` can be resolved from a
//! profile delivered in the same batch.

pub mod note;
pub mod profile;

pub use note::NoteHandler;
pub use profile::ProfileHandler;
