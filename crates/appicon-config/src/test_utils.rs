/// Runs `f` with the given environment variables set and `APPICON_STEALTH`
/// cleared, restoring the previous values afterwards.
pub fn with_env<F>(vars: Vec<(&str, &str)>, f: F)
where
    F: FnOnce(),
{
    let mut touched: Vec<&str> = vars.iter().map(|(key, _)| *key).collect();
    touched.push("APPICON_STEALTH");
    let saved: Vec<_> = touched
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect();

    std::env::remove_var("APPICON_STEALTH");
    for (key, value) in &vars {
        std::env::set_var(key, value);
    }

    f();

    for (key, old) in saved {
        match old {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
