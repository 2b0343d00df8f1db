mod app;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context};
use part_viewer_lib::loader::{request_from_path, ConversionWorker, StlConverter};
use part_viewer_lib::settings::ViewerSettings;
use part_viewer_lib::viewport::software::SoftwareBackend;
use part_viewer_lib::viewport::Viewer;

use app::ViewerApp;

/// Command-line options
#[derive(Debug, Default)]
struct CliArgs {
    open: Option<PathBuf>,
    thumbnail: Option<PathBuf>,
    outline: bool,
    size: Option<(u32, u32)>,
    zoom: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "part_viewer=info,part_viewer_lib=info".into()),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let settings = ViewerSettings::load();

    if args.thumbnail.is_some() {
        return run_thumbnail(args, settings);
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Part Viewer")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "part-viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, settings, args.open.as_deref())?))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start application: {e}"))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut cli = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--open" => cli.open = Some(next_value(&mut args, "--open")?.into()),
            "--thumbnail" => cli.thumbnail = Some(next_value(&mut args, "--thumbnail")?.into()),
            "--outline" => cli.outline = true,
            "--size" => cli.size = Some(parse_size(&next_value(&mut args, "--size")?)?),
            "--zoom" => {
                let value = next_value(&mut args, "--zoom")?;
                cli.zoom = Some(value.parse().with_context(|| format!("invalid zoom '{value}'"))?);
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(cli)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}

/// `WxH`, e.g. `512x512`
fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("size '{s}' is not WxH"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("invalid width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("invalid height in '{s}'"))?;
    if w == 0 || h == 0 {
        bail!("size '{s}' must be positive");
    }
    Ok((w, h))
}

/// Render one part to a PNG without opening a window
fn run_thumbnail(args: CliArgs, settings: ViewerSettings) -> anyhow::Result<()> {
    let input = args.open.context("--thumbnail requires --open <file>")?;
    let output = args.thumbnail.context("missing thumbnail path")?;
    let (width, height) = args.size.unwrap_or((
        settings.capture.thumbnail_width,
        settings.capture.thumbnail_height,
    ));

    let worker = ConversionWorker::new(StlConverter, settings.load_timeout())?;
    let request = request_from_path(&input).with_context(|| format!("cannot open {}", input.display()))?;
    let mesh = worker
        .submit(request)
        .wait()
        .with_context(|| format!("cannot convert {}", input.display()))?;

    let mut viewer = Viewer::new(SoftwareBackend::new(width, height), &settings);
    viewer.load_mesh(&mesh)?;
    if let Some(zoom) = args.zoom {
        viewer.fit_to_screen(zoom);
    }
    let snapshot = if args.outline {
        viewer.outline_snapshot()?
    } else {
        viewer.screenshot()?
    };
    snapshot
        .save(&output)
        .with_context(|| format!("cannot write {}", output.display()))?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        width,
        height,
        outline = args.outline,
        "thumbnail written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<CliArgs> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_thumbnail_args() {
        let cli = parse(&["--open", "part.stl", "--thumbnail", "out.png", "--outline", "--size", "640x480", "--zoom", "1.5"]).unwrap();
        assert_eq!(cli.open, Some(PathBuf::from("part.stl")));
        assert_eq!(cli.thumbnail, Some(PathBuf::from("out.png")));
        assert!(cli.outline);
        assert_eq!(cli.size, Some((640, 480)));
        assert_eq!(cli.zoom, Some(1.5));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["--size", "640"]).is_err());
        assert!(parse(&["--size", "0x10"]).is_err());
        assert!(parse(&["--open"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
