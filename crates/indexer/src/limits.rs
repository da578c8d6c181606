/// Environment override for the number of files parsed at once
pub const ENV_INDEX_CONCURRENCY: &str = "REPOTRACE_INDEX_CONCURRENCY";

const MAX_PARSE_WORKERS: usize = 32;

/// Half the cores, at least two and at most eight; parsing is CPU bound and the
/// generation stage wants headroom later in the run
fn default_parse_workers() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cores / 2).clamp(2, 8)
}

fn resolve_parse_workers(raw: Option<&str>) -> usize {
    match raw.map(str::trim).map(str::parse::<usize>) {
        Some(Ok(n)) => n.clamp(1, MAX_PARSE_WORKERS),
        Some(Err(_)) => {
            log::warn!("Ignoring {ENV_INDEX_CONCURRENCY}={:?}", raw.unwrap_or_default());
            default_parse_workers()
        }
        None => default_parse_workers(),
    }
}

/// Number of files parsed at once, honoring `REPOTRACE_INDEX_CONCURRENCY`
pub fn index_concurrency_from_env() -> usize {
    resolve_parse_workers(std::env::var(ENV_INDEX_CONCURRENCY).ok().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_is_clamped_and_garbage_falls_back() {
        let fallback = default_parse_workers();
        assert!((2..=8).contains(&fallback));

        let cases = [
            (None, fallback),
            (Some("3"), 3),
            (Some(" 6 "), 6),
            (Some("0"), 1),
            (Some("4096"), MAX_PARSE_WORKERS),
            (Some(""), fallback),
            (Some("lots"), fallback),
        ];
        for (raw, expected) in cases {
            assert_eq!(resolve_parse_workers(raw), expected, "raw = {raw:?}");
        }
    }
}
