use anyhow::{Context, Result, bail};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use encoding::all::encodings;
use encoding::types::Encoding;
use log::Level;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use regcert::extract::error_chain;
use regcert::{
    EnrollmentEngine, ExtractSettings, IdentityResolver, ParserSettings, RegistryExportParser,
    SidTable, TemplateAnalysisEngine, TemplateReport, extract_templates, render_csv, render_json,
    render_text,
};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OutputFormats {
    text: bool,
    stdout: bool,
    json: bool,
    csv: bool,
}

struct RegCertDump {
    input: PathBuf,
    sid_file: Option<PathBuf>,
    formats: OutputFormats,
    prefix: String,
    parser_settings: ParserSettings,
    extract_settings: ExtractSettings,
    confirm_overwrite: bool,
    verbosity_level: Option<Level>,
}

impl RegCertDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .context("Missing the input export")?,
        );

        let sid_file = matches.get_one::<String>("sid-file").map(PathBuf::from);

        let mut formats = OutputFormats {
            text: matches.get_flag("text"),
            stdout: matches.get_flag("stdout"),
            json: matches.get_flag("json"),
            csv: matches.get_flag("csv"),
        };
        if formats == OutputFormats::default() {
            formats.text = true;
            formats.json = true;
        }

        let prefix = match matches.get_one::<String>("output") {
            Some(prefix) => prefix.clone(),
            None => jiff::Zoned::now().strftime("%Y%m%d%H%M%S").to_string(),
        };

        let num_threads = *matches.get_one::<usize>("num-threads").unwrap_or(&0);
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, 1) => 1,
            (false, _) => {
                eprintln!(
                    "turned on threads, but library was compiled without `multithreading` feature! using fallback sync iterator"
                );
                1
            }
        };

        let mut extract_settings = ExtractSettings::new().num_threads(num_threads);
        if let Some(root) = matches.get_one::<String>("template-root") {
            extract_settings = extract_settings.template_root(root.clone());
        }

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let codec_name = matches
            .get_one::<String>("ansi-codec")
            .context("`ansi-codec` has a default value")?;
        let ansi_codec = *encodings()
            .iter()
            .find(|c| c.name() == codec_name.as_str())
            .with_context(|| format!("Unknown codec `{}`", codec_name))?;

        Ok(RegCertDump {
            input,
            sid_file,
            formats,
            prefix,
            parser_settings: ParserSettings::new().ansi_codec(ansi_codec),
            extract_settings,
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            verbosity_level,
        })
    }

    /// Main entry point for `RegCertDump`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let tree = RegistryExportParser::parse_file(&self.input, self.parser_settings.clone())?;

        let resolver = match &self.sid_file {
            Some(path) => SidTable::from_sid_file(path)?,
            None => SidTable::new(),
        };

        let extracted = extract_templates(&tree, &self.extract_settings);
        for skipped in &extracted.skipped {
            eprintln!(
                "[!] Skipping template `{}`: {}",
                skipped.name,
                error_chain(&skipped.error)
            );
        }
        println!(
            "[*] Found {} templates in the registry",
            extracted.templates.len()
        );

        let engine = EnrollmentEngine::new(&resolver);
        let reports = build_reports(&extracted.templates, &resolver, &engine);

        if self.formats.stdout {
            print!("{}", render_text(&reports)?);
        }
        if self.formats.text {
            self.save("txt", &render_text(&reports)?)?;
        }
        if self.formats.json {
            self.save("json", &render_json(&reports)?)?;
        }
        if self.formats.csv {
            self.save("csv", &render_csv(&reports)?)?;
        }

        Ok(())
    }

    fn save(&self, extension: &str, contents: &str) -> Result<()> {
        let path = PathBuf::from(format!("{}_Templates.{}", self.prefix, extension));
        let mut file = Self::create_output_file(&path, self.confirm_overwrite).with_context(|| {
            format!(
                "An error occurred while creating output file at `{}`",
                path.display()
            )
        })?;
        file.write_all(contents.as_bytes())?;
        println!("[*] Saved {} output to `{}`", extension, path.display());
        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                    fs::create_dir_all(parent)?;
                    Ok(File::create(p)?)
                }
                Some(_) => Ok(File::create(p)?),
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {:?}", e);
            }
        }
    }
}

fn build_reports(
    templates: &[regcert::CertTemplate],
    resolver: &dyn IdentityResolver,
    engine: &dyn TemplateAnalysisEngine,
) -> Vec<TemplateReport> {
    templates
        .iter()
        .map(|template| {
            let attributes = template.to_attributes(resolver);
            let assessment = engine.assess(&attributes);
            TemplateReport::new(&attributes, assessment)
        })
        .collect()
}

fn main() {
    let codecs: Vec<&'static str> = encodings()
        .iter()
        .filter(|&e| e.raw_decoder().is_ascii_compatible())
        .map(|e| e.name())
        .collect();

    let matches = Command::new("regcert_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Decodes the certificate templates cached in a Windows Registry export")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Path to the .reg export"),
        )
        .arg(
            Arg::new("sid-file")
                .short('s')
                .long("sid-file")
                .action(ArgAction::Set)
                .help("File containing the user's SIDs, one per line. Used to decide which SIDs can enroll."),
        )
        .arg(
            Arg::new("text")
                .long("text")
                .action(ArgAction::SetTrue)
                .help("Write the result as a formatted text file"),
        )
        .arg(
            Arg::new("stdout")
                .long("stdout")
                .action(ArgAction::SetTrue)
                .help("Print the result as text directly to the console"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Write the result as JSON"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .action(ArgAction::SetTrue)
                .help("Write the result as CSV"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .action(ArgAction::Set)
                .value_name("PREFIX")
                .help("Filename prefix for writing results to, defaults to the current local time (YYYYMMDDHHMMSS).\
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`"),
        )
        .arg(
            Arg::new("template-root")
                .long("template-root")
                .action(ArgAction::Set)
                .value_name("PATH")
                .help("Registry key whose subkeys are certificate templates"),
        )
        .arg(
            Arg::new("num-threads")
                .short('t')
                .long("threads")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(usize))
                .default_value("0")
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("ansi-codec")
                .long("ansi-codec")
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(codecs))
                .default_value(encoding::all::WINDOWS_1252.name())
                .help("Codec of exports which have no byte order mark and are not valid UTF-8."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace.\
                       trace output is only available in debug builds, as it is extremely verbose"),
        )
        .get_matches();

    let result = RegCertDump::from_cli_matches(&matches).and_then(|app| app.run());
    if let Err(e) = result {
        eprintln!("{:#}", e);
        exit(1);
    }
}
