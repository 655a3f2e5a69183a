//! Fetching items by id
//!
//! Turns a list of ids (as returned by searches or catalogs) into the full
//! item bodies, one GET per id.

use crate::controller::Controller;
use crate::error::PhpIpamError;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// Fetch the `data` of every id from `controller`, in order
///
/// # Errors
/// * `PhpIpamError::PartialExpansion` - the server answered 400 for an id;
///   carries the items fetched before it, the id and the response
/// * `PhpIpamError::Status` - any other non-success status
///
/// # Example
/// ```no_run
/// # async fn example(client: phpipam_client::PhpIpamClient) -> Result<(), phpipam_client::PhpIpamError> {
/// use phpipam_client::expand_ids;
///
/// let addresses = expand_ids(&client.controller("addresses"), ["12", "13"]).await?;
/// # Ok(())
/// # }
/// ```
pub async fn expand_ids<I, S>(controller: &Controller, ids: I) -> Result<Vec<Value>, PhpIpamError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut found = Vec::new();

    for id in ids {
        let id = id.as_ref();
        debug!("Expanding {} id {}", controller.name(), id);

        let response = controller.get_by_id(id).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(PhpIpamError::PartialExpansion {
                id: id.to_string(),
                processed: found,
                response: Box::new(response),
            });
        }

        let response = response.error_for_status()?;
        found.push(response.data::<Value>()?.unwrap_or(Value::Null));
    }

    Ok(found)
}
