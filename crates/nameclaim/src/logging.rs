//! Log output setup.

use tracing::Level;

/// Install a global `fmt` subscriber.
///
/// `verbose` lowers the level from `INFO` to `DEBUG`, which includes
/// per-peer protocol chatter. Does nothing if a subscriber is already set.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(true);
        init(false);
        tracing::debug!("still logging");
    }
}
