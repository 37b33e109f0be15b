use futures::executor::block_on;
use mermaid_mend::{
    CommandRenderer, MendConfig, MendError, Page, PageSummary, Pipeline, PlaceholderRules,
    correct_fragment, extract_definition,
};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "MERMAID_MEND_LOG";
const PAGE_EXTENSIONS: [&str; 3] = ["html", "htm", "php"];

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Mend(MendError),
    Json(serde_json::Error),
    RendererUnavailable,
    NoDiagram,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Mend(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::RendererUnavailable => {
                write!(f, "Diagram renderer unavailable; pages left unrendered")
            }
            CliError::NoDiagram => write!(f, "No Mermaid diagram detected"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MendError> for CliError {
    fn from(value: MendError) -> Self {
        Self::Mend(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Render,
    Scan,
    Clean,
    Correct,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    config: Option<String>,
    renderer: Option<String>,
    class: Option<String>,
    id_prefix: Option<String>,
    inject_profile: bool,
    out: Option<String>,
    in_place: bool,
    pretty: bool,
    verbose: bool,
}

fn usage() -> &'static str {
    "mermaid-mend\n\
\n\
USAGE:\n\
  mermaid-mend [render] [--config <json>] [--renderer <program>] [--class <name>] [--id-prefix <p>] [--inject-profile] [--out <path>] [--in-place] [--verbose] [<path>|-]\n\
  mermaid-mend scan [--config <json>] [--class <name>] [--id-prefix <p>] [--pretty] [<path>|-]\n\
  mermaid-mend clean [<path>|-]\n\
  mermaid-mend correct [--config <json>] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - render accepts an HTML page or a directory; directories are searched for .html/.htm/.php\n\
    files and need --out <dir> or --in-place.\n\
  - clean prints the definition a raw placeholder text would be rendered from.\n\
  - correct applies the post-render corrections to a standalone SVG.\n\
  - Set MERMAID_MEND_LOG (e.g. 'debug') to control log output on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1).peekable();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "render" => args.command = Command::Render,
            "scan" => args.command = Command::Scan,
            "clean" => args.command = Command::Clean,
            "correct" => args.command = Command::Correct,
            "--in-place" => args.in_place = true,
            "--inject-profile" => args.inject_profile = true,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--config" | "--renderer" | "--class" | "--id-prefix" | "--out" => {
                let Some(value) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let slot = match a.as_str() {
                    "--config" => &mut args.config,
                    "--renderer" => &mut args.renderer,
                    "--class" => &mut args.class,
                    "--id-prefix" => &mut args.id_prefix,
                    _ => &mut args.out,
                };
                *slot = Some(value.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    if args.in_place && args.out.is_some() {
        return Err(CliError::Usage(usage()));
    }
    if args.in_place && matches!(args.input.as_deref(), None | Some("-")) {
        return Err(CliError::Usage(usage()));
    }

    Ok(args)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None | Some("-") => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> Result<MendConfig, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => MendConfig::load(Path::new(path))?,
        None => MendConfig::default(),
    };
    if let Some(program) = &args.renderer {
        config.renderer.program = program.clone();
    }
    if let Some(class) = &args.class {
        config.placeholder.class = class.clone();
    }
    if let Some(prefix) = &args.id_prefix {
        config.placeholder.id_prefix = prefix.clone();
    }
    if args.inject_profile {
        config.inject_profile = true;
    }
    config.validate()?;
    Ok(config)
}

/// Renders one page. Returns `None` when the page has no diagram placeholders.
fn mend_page(
    pipeline: &Pipeline<CommandRenderer>,
    rules: &PlaceholderRules,
    html: &str,
) -> Result<Option<(String, PageSummary)>, CliError> {
    let mut page = Page::parse(html, rules.clone())?;
    if !page.has_diagrams() {
        return Ok(None);
    }
    let summary = block_on(pipeline.process(&mut page));
    Ok(Some((page.to_html()?, summary)))
}

/// Page files under `dir`, in a stable order.
fn collect_pages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    PAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
            {
                pages.push(path);
            }
        }
    }
    pages.sort();
    Ok(pages)
}

fn run_render(args: &Args) -> Result<(), CliError> {
    let config = load_config(args)?;
    let pipeline = config.pipeline();
    let rules = &config.placeholder;

    let input_dir = args
        .input
        .as_deref()
        .filter(|p| *p != "-")
        .map(Path::new)
        .filter(|p| p.is_dir());

    let Some(dir) = input_dir else {
        let html = read_input(args.input.as_deref())?;
        let Some((out, summary)) = mend_page(&pipeline, rules, &html)? else {
            return Err(CliError::NoDiagram);
        };
        match (args.in_place, args.input.as_deref()) {
            (true, Some(path)) => {
                if !summary.unavailable {
                    std::fs::write(path, &out)?;
                }
            }
            _ => write_text(&out, args.out.as_deref())?,
        }
        log_summary(args.input.as_deref().unwrap_or("-"), &summary);
        return if summary.unavailable {
            Err(CliError::RendererUnavailable)
        } else {
            Ok(())
        };
    };

    let out_dir = match (&args.out, args.in_place) {
        (Some(out), false) => Some(PathBuf::from(out)),
        (None, true) => None,
        _ => return Err(CliError::Usage(usage())),
    };

    let mut any_diagrams = false;
    let mut unavailable = false;
    for path in collect_pages(dir)? {
        let html = std::fs::read_to_string(&path)?;
        let mended = mend_page(&pipeline, rules, &html)?;
        let display = path.display().to_string();
        if let Some((_, summary)) = &mended {
            any_diagrams = true;
            unavailable |= summary.unavailable;
            log_summary(&display, summary);
        }

        match &out_dir {
            Some(out_dir) => {
                let relative = path.strip_prefix(dir).unwrap_or(path.as_path());
                let target = out_dir.join(relative);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let text = mended.as_ref().map_or(html.as_str(), |(out, _)| out.as_str());
                std::fs::write(&target, text)?;
            }
            None => {
                if let Some((out, summary)) = &mended {
                    if !summary.unavailable {
                        std::fs::write(&path, out)?;
                    }
                }
            }
        }
    }

    if unavailable {
        return Err(CliError::RendererUnavailable);
    }
    if !any_diagrams {
        return Err(CliError::NoDiagram);
    }
    Ok(())
}

fn log_summary(source: &str, summary: &PageSummary) {
    if summary.failed > 0 {
        tracing::warn!(
            source,
            rendered = summary.rendered,
            failed = summary.failed,
            "some diagrams failed to render"
        );
    } else {
        tracing::info!(source, rendered = summary.rendered, "page rendered");
    }
}

fn run_scan(args: &Args) -> Result<(), CliError> {
    let config = load_config(args)?;
    let html = read_input(args.input.as_deref())?;
    let page = Page::parse(&html, config.placeholder)?;
    if !page.has_diagrams() {
        return Err(CliError::NoDiagram);
    }
    let slots: Vec<serde_json::Value> = page
        .slots()
        .iter()
        .map(|slot| {
            serde_json::json!({
                "index": slot.index,
                "id": slot.id,
                "svgId": slot.svg_id(),
                "definition": slot.definition,
            })
        })
        .collect();
    if args.pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), &slots)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), &slots)?;
    }
    println!();
    Ok(())
}

fn run_clean(args: &Args) -> Result<(), CliError> {
    let raw = read_input(args.input.as_deref())?;
    println!("{}", extract_definition(&raw));
    Ok(())
}

fn run_correct(args: &Args) -> Result<(), CliError> {
    let config = load_config(args)?;
    let svg = read_input(args.input.as_deref())?;
    let corrected = correct_fragment(&svg, &config.policy);
    if !corrected.report.found_svg {
        return Err(CliError::NoDiagram);
    }
    tracing::debug!(report = ?corrected.report, "corrected standalone svg");
    write_text(&corrected.svg, args.out.as_deref())
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Render => run_render(&args),
        Command::Scan => run_scan(&args),
        Command::Clean => run_clean(&args),
        Command::Correct => run_correct(&args),
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(CliError::NoDiagram) => {
            eprintln!("{}", CliError::NoDiagram);
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
