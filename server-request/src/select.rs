//! Temporary transport selection.

use std::collections::HashSet;

use tracing::trace;

use crate::{SessionInfo, Transport, TransportCatalog, TransportHandle};

/// Picks a transport to carry a single fallback request.
///
/// A candidate is eligible when its protocol differs from the current transport's (the current
/// transport is down for a reason) and it can connect using `session` alone, without a
/// handshake. When several are eligible, the last one in catalog order wins; the choice is
/// arbitrary but deterministic.
///
/// Every enumerated candidate other than the returned one is released before returning.
pub fn select_temp_transport(
    catalog: &dyn TransportCatalog,
    current: Option<&dyn Transport>,
    session: &SessionInfo,
) -> Option<TransportHandle> {
    select_temp_transport_excluding(catalog, current, session, &HashSet::new())
}

/// Same as [`select_temp_transport`], additionally skipping protocols in `tried`.
pub fn select_temp_transport_excluding(
    catalog: &dyn TransportCatalog,
    current: Option<&dyn Transport>,
    session: &SessionInfo,
    tried: &HashSet<String>,
) -> Option<TransportHandle> {
    let current_protocol = current.map(|t| t.protocol_name());
    let mut selected: Option<TransportHandle> = None;

    // candidates are consumed by value; every one not kept is dropped, and thereby released,
    // by the end of its loop iteration
    for candidate in catalog.new_all() {
        let protocol = candidate.protocol_name();

        let eligible = Some(protocol) != current_protocol
            && !tried.contains(protocol)
            && !candidate.is_handshake_required(session);

        if eligible {
            trace!("temporary transport candidate: {}", protocol);
            selected = Some(candidate);
        }
    }

    selected
}
