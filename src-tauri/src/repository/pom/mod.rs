//! POM Repository Module
//!
//! - pom_repo: Core CRUD operations, elements loaded and saved with the POM
//! - pom_elements: Element collection, group filing and attachment operations

mod pom_repo;
mod pom_elements;

pub use pom_repo::PomRepository;
pub(crate) use pom_repo::query_poms_in_group;

pub use pom_elements::PomElementOperations;
