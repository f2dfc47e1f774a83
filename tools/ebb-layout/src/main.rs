mod args;
mod logger;

use args::{Options, USAGE};
use ebb_frame::{Abi, FrameLayout, LAYOUTS, Region, Special, Variant};
use log::{LevelFilter, debug, error, info};
use logger::StderrLogger;
use std::fmt::Write as _;
use std::process::ExitCode;
use std::{env, io};

fn main() -> ExitCode {
    let options = match Options::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let level = if options.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = StderrLogger::init(level) {
        eprintln!("cannot install logger: {e}");
    }

    let mut report = String::new();
    let mut failures = 0;
    for &abi in &options.targets {
        for layout in layouts_of(abi) {
            if let Err(e) = layout.verify() {
                error!("{abi} / {}: {e}", layout.variant);
                failures += 1;
            }
            render(&mut report, layout, options.verbose);
        }
    }

    if let Err(e) = io::Write::write_all(&mut io::stdout().lock(), report.as_bytes()) {
        error!("cannot write report: {e}");
        return ExitCode::FAILURE;
    }

    if failures > 0 {
        error!("{failures} layout(s) failed verification");
        return ExitCode::FAILURE;
    }
    info!("all {} layout(s) verified", options.targets.len() * Variant::ALL.len());
    ExitCode::SUCCESS
}

fn layouts_of(abi: Abi) -> &'static [FrameLayout; 4] {
    let row = Abi::ALL
        .iter()
        .position(|&a| a == abi)
        .unwrap_or_default();
    &LAYOUTS[row]
}

/// Appends one layout's offset table to `out`.
fn render(out: &mut String, layout: &FrameLayout, verbose: bool) {
    let _ = writeln!(
        out,
        "{} / {}: {} bytes",
        layout.abi, layout.variant, layout.size
    );
    let _ = writeln!(
        out,
        "  {:<13} {:>6} {:>6} {:>6} {:>6} {:>6}",
        "region", "offset", "end", "count", "stride", "width"
    );
    for region in layout.present_regions() {
        let _ = writeln!(
            out,
            "  {:<13} {:>6} {:>6} {:>6} {:>6} {:>6}",
            region.kind, region.offset, region.end(), region.count, region.stride, region.width
        );
        debug!(
            "{} / {}: {} spans {:#06x}..{:#06x}",
            layout.abi,
            layout.variant,
            region.kind,
            region.offset,
            region.end()
        );
    }

    if verbose {
        for special in Special::ALL {
            let _ = writeln!(out, "    {special:?} @ {}", layout.special_slot(special));
        }
        render_slots(out, "r", &layout.gpr, |n| layout.abi.saves_gpr(n));
    }
    out.push('\n');
}

fn render_slots(out: &mut String, prefix: &str, region: &Region, saved: impl Fn(usize) -> bool) {
    for n in 0..region.count {
        let note = if saved(n) { "" } else { " (reserved)" };
        let _ = writeln!(out, "    {prefix}{n} @ {}{note}", region.slot(n));
    }
}
