//! Target selection over the inventory

use crate::error::{Error, Result};
use crate::types::Host;

/// Hosts selected by `term`, in inventory order
///
/// A host is selected when its spec group or its name equals `term`. An empty
/// inventory and an empty selection are both errors.
pub fn select_targets(hosts: &[Host], term: &str) -> Result<Vec<Host>> {
    if hosts.is_empty() {
        return Err(Error::NoHostsConfigured);
    }

    let selected: Vec<Host> = hosts.iter().filter(|h| h.matches(term)).cloned().collect();
    if selected.is_empty() {
        return Err(Error::NoTargets {
            term: term.to_string(),
        });
    }

    log::debug!("'{term}' selected {} of {} hosts", selected.len(), hosts.len());
    Ok(selected)
}
