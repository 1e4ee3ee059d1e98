//! ID resolver module
//!
//! Resolves run id prefixes to full UUIDs by querying the run list, so
//! operators can type the first few characters of a run id.

use anyhow::{Context, Result, anyhow};
use sluice_client::OrchestratorClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a run ID or prefix to a full UUID
///
/// Fails when no run or more than one run matches the prefix.
pub async fn resolve_run_id(client: &OrchestratorClient, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    pick_unique(runs.iter().map(|r| r.id), id_or_prefix)
}

fn pick_unique(ids: impl Iterator<Item = Uuid>, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    let matches: Vec<Uuid> = ids.filter(|id| id_or_prefix.matches(id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", id_or_prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                id_or_prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        [
            "aa11aaaa-0000-4000-8000-000000000000",
            "aa22aaaa-0000-4000-8000-000000000000",
            "bb33bbbb-0000-4000-8000-000000000000",
        ]
        .iter()
        .map(|s| Uuid::parse_str(s).unwrap())
        .collect()
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let id = pick_unique(ids().into_iter(), &IdOrPrefix::parse("bb")).unwrap();
        assert_eq!(id, ids()[2]);
    }

    #[test]
    fn test_ambiguous_prefix_rejected() {
        let err = pick_unique(ids().into_iter(), &IdOrPrefix::parse("aa")).unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let err = pick_unique(ids().into_iter(), &IdOrPrefix::parse("cc")).unwrap_err();
        assert!(err.to_string().contains("No run found"));
    }
}
