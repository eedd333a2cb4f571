//! Extension parsers - turn discovered extension types into live extensions

use super::registry::ExtensionType;
use crate::dispatch::HandlerError;

/// Manages one kind of extension.
///
/// The registry hands every registered extension type to each parser that
/// [`accepts`](ExtensionParser::accepts) it: `load` when the system loads,
/// `unload` when it unloads and `reload` when it reloads.
pub trait ExtensionParser: Send {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    fn accepts(&self, extension: &ExtensionType) -> bool;

    fn load(&mut self, extension: &ExtensionType) -> Result<(), HandlerError>;

    fn unload(&mut self, extension: &ExtensionType) -> Result<(), HandlerError>;

    fn reload(&mut self, extension: &ExtensionType) -> Result<(), HandlerError> {
        self.unload(extension)?;
        self.load(extension)
    }
}
