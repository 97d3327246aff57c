use std::{collections::BTreeSet, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::config::Resource;

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Parses a comma separated resource list such as `playlists,saved-tracks`.
///
/// `all` selects every resource. Duplicates collapse.
pub fn parse_resources(value: &str) -> Result<BTreeSet<Resource>, String> {
    let mut resources = BTreeSet::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("all") {
            resources.extend(Resource::ALL);
        } else {
            resources.insert(part.parse::<Resource>()?);
        }
    }

    if resources.is_empty() {
        return Err("expected at least one resource".to_string());
    }
    Ok(resources)
}

/// Applies `--only` and `--skip` to the full resource set.
pub fn select_resources(
    only: Option<&BTreeSet<Resource>>,
    skip: Option<&BTreeSet<Resource>>,
) -> BTreeSet<Resource> {
    let mut selected: BTreeSet<Resource> = match only {
        Some(only) => only.clone(),
        None => Resource::ALL.into_iter().collect(),
    };
    if let Some(skip) = skip {
        selected.retain(|r| !skip.contains(r));
    }
    selected
}

/// Renders a duration as `1m 05.250s` or `3.100s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs >= 60 {
        format!("{}m {:02}.{:03}s", secs / 60, secs % 60, millis)
    } else {
        format!("{}.{:03}s", secs, millis)
    }
}
