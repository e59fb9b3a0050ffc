//! Services for resolving, binding and running commands.

mod catalog;
mod handler;
mod registry;
mod substitution;

pub use catalog::{CatalogError, TemplateCatalog};
pub use handler::{BoundCommand, CommandExecutionError, CommandHandler, TemplateHandler};
pub use registry::{AddOutcome, CommandRegistry, FailedDefinition, RebuildReport, RegistryError};
pub use substitution::{TokenDescription, VariableSubstitutionEngine};
