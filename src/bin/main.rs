//! SIFEN Signer CLI
//!
//! Command-line interface for building, signing, packaging and submitting
//! SIFEN electronic documents, with status polling and automatic correction
//! of element-ordering rejections.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use miette::Report;
use sifen_signer::{
    adapters::{resolve_credentials, SifenHttpClient, SifenHttpConfig, SifenTransport, SubmissionStore},
    domain::{
        cdc::{self, Cdc},
        document::DocumentFields,
        response::{ExitClass, StatusResult, SubmissionResult},
        submission::SubmissionRecord,
        types::{CorrelationId, Environment, ProtocolId},
        xml::{parse_document, Element},
    },
    infra::{
        config::{ConfigManager, ExportFormat, SifenConfiguration},
        error::{SifenError, SifenResult},
        logging::Logger,
    },
    pipelines::{
        poll_until_terminal, unwrap_single, AutofixLoop, AutofixOptions, AutofixOutcome,
        PollOptions, SignWorkflow, SignedDocument, SubmitWorkflow, VerifyWorkflow,
    },
    services::{build_rde, cert_validator::CertificateUse, lote, OrderingTable},
};

const SIGNED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Parser)]
#[command(name = "sifen-signer")]
#[command(about = "Sign, package and submit SIFEN electronic documents")]
#[command(long_about = "
SIFEN Signer - electronic document utility for Paraguay's SIFEN service

EXAMPLES:
    # Build and sign a factura from its field mapping
    sifen-signer sign factura.json -o factura.signed.xml

    # Check or repair a CDC
    sifen-signer cdc validate 01045547378001001000000112025123011234567895
    sifen-signer cdc fix 0104554737800100100000011202512301123456789

    # Package a signed document and look inside the archive
    sifen-signer lote assemble factura.signed.xml -o lote.zip
    sifen-signer lote inspect lote.zip

    # Submit and wait for the lote to be processed
    sifen-signer submit factura.signed.xml --wait

    # Submit, correcting ordering rejections until accepted
    sifen-signer autofix factura.json --session-log session.json

INPUTS:
    Files ending in .json are read as a document field mapping; anything
    else is read as an unsigned rDE (or an rLoteDE holding one rDE).

ENVIRONMENT VARIABLES:
    SIFEN_CONFIG         Configuration file path
    SIFEN_SIGN_PASSWORD  Signing certificate password
    SIFEN_TLS_PASSWORD   Transport (mTLS) certificate password
    RUST_LOG             Logging level (debug, info, warn, error)

EXIT CODES:
    0  accepted, queued, or rejected by business rules over a healthy channel
    1  technical rejection, exhausted retries, still processing
    2  configuration or certificate failure
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "SIFEN_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Target environment (overrides config)
    #[arg(long = "env", global = true, value_enum)]
    environment: Option<EnvironmentArg>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (from JSON fields) or normalize (from XML) and sign a document
    Sign {
        /// Field mapping (.json) or unsigned XML
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Output file (defaults to <input>.signed.xml)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Signing time for dFecFirma, YYYY-MM-DDTHH:MM:SS (defaults to now)
        #[arg(long, value_name = "TIMESTAMP")]
        signed_at: Option<String>,
    },

    /// CDC generation and check-digit tools
    #[command(subcommand)]
    Cdc(CdcCommands),

    /// Lote packaging tools
    #[command(subcommand)]
    Lote(LoteCommands),

    /// Submit a signed document as a one-document lote
    Submit {
        /// Signed document
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,

        /// Correlation id (dId), digits only (defaults to a generated one)
        #[arg(long, value_name = "DID")]
        correlation_id: Option<String>,

        /// Poll until the lote reaches a terminal state
        #[arg(short, long)]
        wait: bool,
    },

    /// Poll a queued lote by protocol number
    Poll {
        /// Protocol number returned on submission
        #[arg(value_name = "PROTOCOL")]
        protocol: String,
    },

    /// Query one document by CDC
    Query {
        #[arg(value_name = "CDC")]
        cdc: String,
    },

    /// List stored submission records
    Records,

    /// Submit and automatically correct element-ordering rejections
    Autofix {
        /// Field mapping (.json) or unsigned XML
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Where to write the accepted signed document
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Write the per-iteration session log as JSON
        #[arg(long, value_name = "PATH")]
        session_log: Option<PathBuf>,

        /// Iteration limit (overrides config)
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Signing time for dFecFirma, YYYY-MM-DDTHH:MM:SS (defaults to now)
        #[arg(long, value_name = "TIMESTAMP")]
        signed_at: Option<String>,
    },

    /// Verify the signature, CDC and packaging rules of a signed document
    Verify {
        /// Signed XML, or a lote archive (.zip)
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum CdcCommands {
    /// Compute the CDC of a field mapping
    Generate {
        /// Field mapping (.json)
        fields: PathBuf,
    },

    /// Check the check digit of a 44-digit code
    Validate { code: String },

    /// Recompute the check digit of a 43- or 44-digit code
    Fix { code: String },
}

#[derive(Subcommand)]
enum LoteCommands {
    /// Wrap a signed document into a lote archive
    Assemble {
        /// Signed document
        signed: PathBuf,

        /// Archive output (defaults to <input>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the rEnvioLote SOAP envelope here
        #[arg(long)]
        soap: Option<PathBuf>,

        /// Correlation id (dId), digits only
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// List the entries of a lote archive and print its XML
    Inspect {
        /// Lote archive
        archive: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration (passwords are never exported)
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum EnvironmentArg {
    Test,
    Prod,
}

impl From<EnvironmentArg> for Environment {
    fn from(arg: EnvironmentArg) -> Self {
        match arg {
            EnvironmentArg::Test => Environment::Test,
            EnvironmentArg::Prod => Environment::Prod,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Loaded configuration plus the root logger for one invocation.
struct Session {
    manager: ConfigManager,
    config: SifenConfiguration,
    logger: Logger,
    verbose: bool,
}

impl Session {
    fn open(
        manager: ConfigManager,
        environment: Option<EnvironmentArg>,
        verbose: bool,
        logger: &Logger,
    ) -> SifenResult<Self> {
        let mut config = manager.load_with_env()?;
        if let Some(environment) = environment {
            config.environment = environment.into();
        }
        let logger = logger.clone();
        logger.debug(format!(
            "environment {} config {}",
            config.environment,
            manager.config_path().display()
        ));
        Ok(Self {
            verbose: verbose || config.verbose,
            manager,
            config,
            logger,
        })
    }

    fn signer(&self) -> SifenResult<SignWorkflow> {
        let source = resolve_credentials(&self.config.signing, CertificateUse::Signing, &self.logger)?;
        let material = source.load()?;
        SignWorkflow::new(
            &material,
            OrderingTable::seeded(),
            self.config.schema(),
            &self.logger,
        )
    }

    fn transport(&self) -> SifenResult<SifenHttpClient> {
        let source = resolve_credentials(
            self.config.transport_credentials(),
            CertificateUse::Transport,
            &self.logger,
        )?;
        Ok(SifenHttpClient::new(
            SifenHttpConfig::from(&self.config),
            source,
            &self.logger,
        ))
    }

    fn store(&self) -> SubmissionStore {
        SubmissionStore::new(self.manager.state_dir(&self.config), &self.logger)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let exit = match run(cli) {
        Ok(class) => class,
        Err(error) => {
            let class = ExitClass::from_error(&error);
            eprintln!("{:?}", Report::new(error));
            class
        }
    };
    ExitCode::from(exit.code())
}

fn run(cli: Cli) -> SifenResult<ExitClass> {
    let Cli {
        config,
        environment,
        verbose,
        command,
    } = cli;
    let logger = Logger::new("sifen").with_session(format!("{:08x}", rand::random::<u32>()));
    let manager = match config {
        Some(path) => ConfigManager::with_path(path, &logger),
        None => ConfigManager::new(&logger)?,
    };
    let open = || Session::open(manager.clone(), environment, verbose, &logger);

    match command {
        Commands::Sign {
            input_file,
            output,
            signed_at,
        } => handle_sign_command(&open()?, &input_file, output, signed_at.as_deref()),
        Commands::Cdc(cdc_cmd) => handle_cdc_command(cdc_cmd),
        Commands::Lote(lote_cmd) => handle_lote_command(&open()?, lote_cmd),
        Commands::Submit {
            file,
            correlation_id,
            wait,
        } => handle_submit_command(&open()?, &file, correlation_id.as_deref(), wait),
        Commands::Poll { protocol } => handle_poll_command(&open()?, &protocol),
        Commands::Query { cdc } => handle_query_command(&open()?, &cdc),
        Commands::Records => handle_records_command(&open()?),
        Commands::Autofix {
            input_file,
            output,
            session_log,
            max_iterations,
            signed_at,
        } => handle_autofix_command(
            &open()?,
            &input_file,
            output,
            session_log,
            max_iterations,
            signed_at.as_deref(),
        ),
        Commands::Verify { file } => handle_verify_command(&file, verbose),
        Commands::Config(config_cmd) => {
            handle_config_command(&manager, config_cmd)?;
            Ok(ExitClass::Success)
        }
    }
}

fn handle_sign_command(
    session: &Session,
    input_file: &Path,
    output: Option<PathBuf>,
    signed_at: Option<&str>,
) -> SifenResult<ExitClass> {
    let signer = session.signer()?;
    let signed: SignedDocument = if is_field_mapping(input_file) {
        let fields = read_fields(input_file)?;
        signer.build_and_sign(&fields, signing_time(signed_at)?)?
    } else {
        signer.sign_xml(&fs::read_to_string(input_file)?)?
    };

    let output_path = output.unwrap_or_else(|| input_file.with_extension("signed.xml"));
    fs::write(&output_path, &signed.xml)?;

    println!("✅ Document signed");
    println!("  CDC: {}", signed.cdc);
    println!("  Output: {}", output_path.display());
    Ok(ExitClass::Success)
}

fn handle_cdc_command(cdc_cmd: CdcCommands) -> SifenResult<ExitClass> {
    match cdc_cmd {
        CdcCommands::Generate { fields } => {
            let fields = read_fields(&fields)?;
            fields.validate()?;
            let code = cdc::generate(&fields.cdc_fields())?;
            println!("{code}");
            Ok(ExitClass::Success)
        }
        CdcCommands::Validate { code } => {
            let result = cdc::validate(&code)?;
            if result.ok {
                println!("✅ Check digit {} is correct", result.declared_digit);
                Ok(ExitClass::Success)
            } else {
                println!(
                    "❌ Check digit mismatch: declared {}, computed {}",
                    result.declared_digit, result.computed_digit
                );
                Ok(ExitClass::Failure)
            }
        }
        CdcCommands::Fix { code } => {
            println!("{}", cdc::fix(&code)?);
            Ok(ExitClass::Success)
        }
    }
}

fn handle_lote_command(session: &Session, lote_cmd: LoteCommands) -> SifenResult<ExitClass> {
    match lote_cmd {
        LoteCommands::Assemble {
            signed,
            output,
            soap,
            correlation_id,
        } => {
            let root = parse_document(&fs::read_to_string(&signed)?)?;
            let correlation_id = correlation_id_or_generate(correlation_id.as_deref())?;
            let package = lote::assemble(&root, &correlation_id, &session.logger)?;

            let output_path = output.unwrap_or_else(|| signed.with_extension("zip"));
            fs::write(&output_path, &package.zip_bytes)?;
            if let Some(soap_path) = &soap {
                fs::write(soap_path, &package.soap_body)?;
            }

            println!("✅ Lote assembled");
            println!("  dId: {}", package.correlation_id);
            println!(
                "  Archive: {} ({} bytes)",
                output_path.display(),
                package.zip_bytes.len()
            );
            if let Some(soap_path) = soap {
                println!("  SOAP envelope: {}", soap_path.display());
            }
            Ok(ExitClass::Success)
        }
        LoteCommands::Inspect { archive } => {
            let bytes = fs::read(&archive)?;
            for entry in lote::entries(&bytes)? {
                println!(
                    "📦 {} ({} bytes, {})",
                    entry.name,
                    entry.size,
                    if entry.stored { "stored" } else { "compressed" }
                );
            }
            println!("{}", lote::unpack(&bytes)?);
            Ok(ExitClass::Success)
        }
    }
}

fn handle_submit_command(
    session: &Session,
    file: &Path,
    correlation_id: Option<&str>,
    wait: bool,
) -> SifenResult<ExitClass> {
    let root = parse_document(&fs::read_to_string(file)?)?;
    let correlation_id = correlation_id_or_generate(correlation_id)?;
    let store = session.store();

    let mut workflow = SubmitWorkflow::new(
        session.transport()?,
        session.config.environment,
        &session.logger,
    )
    .with_store(&store);
    let outcome = workflow.submit(&root, &correlation_id)?;
    print_submission(&outcome.result);

    match outcome.record {
        Some(mut record) if wait => {
            let mut transport = workflow.into_transport();
            let status = poll_until_terminal(
                &mut transport,
                &mut record,
                PollOptions::from(&session.config),
                Some(&store),
                &session.logger,
            )?;
            print_status(&status);
            Ok(ExitClass::from_status(&status))
        }
        _ => Ok(ExitClass::from_submission(&outcome.result)),
    }
}

fn handle_poll_command(session: &Session, protocol: &str) -> SifenResult<ExitClass> {
    let protocol = ProtocolId::new(protocol)?;
    let store = session.store();
    let mut record = match store.load(&protocol)? {
        Some(record) => record,
        None => {
            session
                .logger
                .warn(format!("no stored record for protocol {protocol}"));
            SubmissionRecord::new(protocol, session.config.environment, "", Vec::new())
        }
    };

    let mut transport = session.transport()?;
    let status = poll_until_terminal(
        &mut transport,
        &mut record,
        PollOptions::from(&session.config),
        Some(&store),
        &session.logger,
    )?;
    print_status(&status);
    Ok(ExitClass::from_status(&status))
}

fn handle_query_command(session: &Session, code: &str) -> SifenResult<ExitClass> {
    let cdc = Cdc::parse(code)?;
    let status = session.transport()?.query_document(&cdc)?;
    print_status(&status);
    Ok(ExitClass::from_status(&status))
}

fn handle_records_command(session: &Session) -> SifenResult<ExitClass> {
    let store = session.store();
    let records = store.list()?;
    if records.is_empty() {
        println!("📋 No submission records in {}", store.dir().display());
        return Ok(ExitClass::Success);
    }
    println!("📋 Submission records ({}):", store.dir().display());
    for record in records {
        println!(
            "  {} [{}] {:?} attempts={} documents={} last={}",
            record.protocol,
            record.environment,
            record.status,
            record.attempts,
            record.cdcs.len(),
            record.last_code.as_deref().unwrap_or("-")
        );
    }
    Ok(ExitClass::Success)
}

fn handle_autofix_command(
    session: &Session,
    input_file: &Path,
    output: Option<PathBuf>,
    session_log: Option<PathBuf>,
    max_iterations: Option<u32>,
    signed_at: Option<&str>,
) -> SifenResult<ExitClass> {
    let unsigned: Element = if is_field_mapping(input_file) {
        let fields = read_fields(input_file)?;
        build_rde(&fields, signing_time(signed_at)?, &session.logger)?.0
    } else {
        unwrap_single(parse_document(&fs::read_to_string(input_file)?)?)?
    };

    let signer = session.signer()?;
    let options = AutofixOptions {
        max_iterations: max_iterations.unwrap_or(session.config.max_autofix_iterations),
        environment: session.config.environment,
        poll: PollOptions::from(&session.config),
    };
    let report = AutofixLoop::new(session.transport()?, &signer, options, &session.logger)
        .run(unsigned)?;

    for entry in &report.session {
        let correction = entry
            .correction
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!("  #{} {correction}", entry.iteration);
        if session.verbose && !entry.error_text.is_empty() {
            println!("     {}", entry.error_text);
        }
    }
    if let Some(path) = &session_log {
        let json = serde_json::to_string_pretty(&report.session)
            .map_err(|e| SifenError::IoError(format!("session log: {e}")))?;
        fs::write(path, json)?;
        println!("  Session log: {}", path.display());
    }

    match report.outcome {
        AutofixOutcome::Accepted { signed, status } => {
            let output_path = output.unwrap_or_else(|| input_file.with_extension("signed.xml"));
            fs::write(&output_path, &signed.xml)?;
            println!(
                "✅ Accepted after {} iteration(s): CDC {}",
                report.iterations, signed.cdc
            );
            println!("  Output: {}", output_path.display());
            print_status(&status);
            Ok(ExitClass::Success)
        }
        AutofixOutcome::FatalError { reason } => {
            println!("❌ Stopped: {reason}");
            Ok(ExitClass::Failure)
        }
        AutofixOutcome::Exhausted { reason } => {
            println!("⚠️  Gave up after {} iteration(s): {reason}", report.iterations);
            Ok(ExitClass::Failure)
        }
    }
}

fn handle_verify_command(file: &Path, verbose: bool) -> SifenResult<ExitClass> {
    let xml = if file.extension().is_some_and(|ext| ext == "zip") {
        lote::unpack(&fs::read(file)?)?
    } else {
        fs::read_to_string(file)?
    };
    let report = VerifyWorkflow::new().run(&xml);

    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    println!("🔍 {}", file.display());
    println!("  {} Signature placement", mark(report.signature.structure_ok));
    println!("  {} Digest", mark(report.signature.digest_ok));
    println!("  {} Signature value", mark(report.signature.signature_ok));
    println!("  {} Certificate", mark(report.signature.certificate_present));
    match &report.cdc {
        Some(result) => println!("  {} CDC check digit", mark(result.ok)),
        None => println!("  ❌ CDC missing or malformed"),
    }
    println!("  {} Packaging rules", mark(report.structure.is_empty()));

    if verbose {
        for problem in report.signature.problems.iter().chain(&report.structure) {
            println!("     - {problem}");
        }
    }
    Ok(if report.success() {
        ExitClass::Success
    } else {
        ExitClass::Failure
    })
}

fn handle_config_command(manager: &ConfigManager, config_cmd: ConfigCommands) -> SifenResult<()> {
    match config_cmd {
        ConfigCommands::Show => match manager.load() {
            Ok(config) => {
                let show = |path: &Option<PathBuf>| {
                    path.as_ref()
                        .map_or_else(|| "(not set)".to_string(), |p| p.display().to_string())
                };
                println!("📋 Current Configuration:");
                println!("  Environment: {}", config.environment);
                println!("  Signing certificate: {}", show(&config.signing.cert_path));
                println!("  Signing key: {}", show(&config.signing.key_path));
                let transport = config.transport_credentials();
                println!("  Transport certificate: {}", show(&transport.cert_path));
                println!("  Network timeout: {}s", config.network_timeout_seconds);
                println!(
                    "  Retries: {} (base delay {}ms)",
                    config.retry_attempts, config.retry_base_delay_ms
                );
                println!(
                    "  Polling: every {}s, at most {} times",
                    config.poll_interval_seconds, config.max_poll_attempts
                );
                println!("  Auto-fix iterations: {}", config.max_autofix_iterations);
                println!("  Schema version: {}", config.schema());
                println!("  State directory: {}", manager.state_dir(&config).display());
                println!("  Configuration file: {}", manager.config_path().display());
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            manager.load_or_create_default()?;
            println!(
                "✅ Configuration initialized: {}",
                manager.config_path().display()
            );
            println!("   Edit the file to set certificate paths, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            manager.update_value(&key, &value)?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = manager.export_config(format.into())?;
            if let Some(output_path) = output {
                fs::write(&output_path, content)?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = fs::read_to_string(&file)?;
            manager.import_config(&content, format.into())?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }
    Ok(())
}

fn print_submission(result: &SubmissionResult) {
    match result {
        SubmissionResult::Queued { protocol, status } => {
            println!("📨 Queued: protocol {protocol} ({status})");
        }
        SubmissionResult::Unknown { detail } => println!("❓ Unclassified response: {detail}"),
        other => {
            if let Some(status) = other.status() {
                println!("📨 {}: {status}", other.class());
            }
        }
    }
}

fn print_status(result: &StatusResult) {
    match result {
        StatusResult::Unknown { detail } => println!("❓ Unclassified response: {detail}"),
        other => {
            if let Some(status) = other.status() {
                println!("📊 {}: {status}", other.class());
            }
        }
    }
    if let StatusResult::Completed { documents, .. } = result {
        for document in documents {
            println!(
                "  {} {} {} ({})",
                if document.accepted() { "✅" } else { "❌" },
                document.cdc,
                document.state,
                document.status
            );
            if let Some(pair) = &document.pair {
                println!("     {pair}");
            }
        }
    }
}

fn is_field_mapping(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn read_fields(path: &Path) -> SifenResult<DocumentFields> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SifenError::InvalidInput(format!("{}: {e}", path.display())))
}

fn signing_time(signed_at: Option<&str>) -> SifenResult<NaiveDateTime> {
    match signed_at {
        Some(value) => NaiveDateTime::parse_from_str(value, SIGNED_AT_FORMAT).map_err(|e| {
            SifenError::InvalidInput(format!("signing time '{value}': {e}"))
        }),
        None => Ok(Local::now().naive_local()),
    }
}

fn correlation_id_or_generate(value: Option<&str>) -> SifenResult<CorrelationId> {
    value.map_or_else(|| Ok(CorrelationId::generate()), CorrelationId::new)
}
