// ============================================================
// Layer 6 — Progress Bars
// ============================================================
// One indicatif bar per long pass (epoch loss pass, BLEU
// decoding). The bar message carries the running figure,
// e.g. "loss 3.2104" or "BLEU 27.41".

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "  {prefix:>8} {bar:40.green/black} {pos}/{len} [{elapsed}<{eta}] {msg}";

/// A bar of `len` steps, or a hidden one when `enabled` is false
/// (tests, piped output).
pub fn pass_bar(len: usize, prefix: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar());
    let pb = ProgressBar::new(len as u64);
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}
