use tracing::info;

use crate::descriptor::{Params, QueryDescriptor};

/// Collaborator output paired with the target it was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval<T> {
    pub target: String,
    pub output: T,
}

/// Hand a validated query to `retrieve` exactly once.
///
/// `retrieve` receives the dataset id, the serialized parameters and the
/// target path. Its error is returned as-is; nothing is retried.
pub fn submit<F, T, E>(descriptor: &QueryDescriptor, retrieve: F) -> Result<Retrieval<T>, E>
where
    F: FnOnce(&str, &Params, &str) -> Result<T, E>,
{
    let params = descriptor.params();
    info!(
        dataset = descriptor.dataset(),
        path = descriptor.target(),
        variables = descriptor.variables().len(),
        "submitting query"
    );
    let output = retrieve(descriptor.dataset(), &params, descriptor.target())?;
    Ok(Retrieval {
        target: descriptor.target().to_string(),
        output,
    })
}
