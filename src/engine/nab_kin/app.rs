use std::fmt::Debug;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicI32, Ordering};

// crates that log at the app level, in addition to the app crate itself
const KIN_CRATES: [&str; 3] = ["nab_kin", "math_kin", "anim_kin"];

fn joined_args() -> String
{
    std::env::args().collect::<Vec<_>>().join(" ")
}

fn resolve_against(app_dir: &Path, path: &Path) -> PathBuf
{
    if path.is_absolute() || path.exists()
    {
        return path.to_path_buf();
    }

    let beside_app = app_dir.join(path);
    match beside_app.exists()
    {
        true => beside_app,
        false => path.to_path_buf(),
    }
}

pub trait CliArgs: clap::Parser + Debug { }
impl<T: clap::Parser + Debug> CliArgs for T { }

fn crate_name<T>() -> &'static str
{
    let name = std::any::type_name::<T>();
    match name.find("::")
    {
        Some(end) => &name[0..end],
        None => name,
    }
}

#[derive(Debug)]
pub struct AppRun<TCliArgs: CliArgs>
{
    pub app_name: &'static str,
    pub version_str: &'static str,

    pub start_time: chrono::DateTime<chrono::Local>,
    pub args: TCliArgs,
    pub pid: u32,
    pub is_elevated: bool,

    pub app_dir: PathBuf, // where the app exe is located (distinct from working dir)

    exit_reason: AtomicI32,
}
impl<TCliArgs: CliArgs> AppRun<TCliArgs>
{
    pub fn startup(app_name: &'static str, app_version: &'static str) -> Self
    {
        #[cfg(debug_assertions)]
        let default_log_levels = (log::LevelFilter::Warn, log::LevelFilter::Debug);
        #[cfg(not(debug_assertions))]
        let default_log_levels = (log::LevelFilter::Warn, log::LevelFilter::Info);
        let app_crate = crate_name::<TCliArgs>();

        let mut logger = colog::basic_builder();
        logger
            .filter_level(default_log_levels.0)
            .filter_module(app_crate, default_log_levels.1);
        for kin_crate in KIN_CRATES
        {
            logger.filter_module(kin_crate, default_log_levels.1);
        }
        // may already be set (e.g. by a test harness)
        let _ = logger.parse_default_env().try_init();

        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_default();

        let app_run = Self
        {
            app_name,
            version_str: app_version,
            start_time: chrono::Local::now(),
            args: TCliArgs::parse(),
            pid: std::process::id(),
            #[cfg(not(target_family="wasm"))]
            is_elevated: is_root::is_root(),
            #[cfg(target_family="wasm")]
            is_elevated: false,
            app_dir,
            exit_reason: AtomicI32::new(ExitReason::NormalExit as i32),
        };

        log::info!(target: app_crate,
            "=== Starting {} v{} [{}] (PID {}){} at {} ===",
            app_run.app_name,
            app_run.version_str,
            joined_args(),
            app_run.pid,
            if app_run.is_elevated { " elevated" } else { "" },
            app_run.start_time);

        app_run
    }

    /// Relative paths that don't exist from the working dir are looked up next to the app exe
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf
    {
        resolve_against(&self.app_dir, path)
    }

    pub fn set_exit_reason(&self, exit_reason: ExitReason)
    {
        self.exit_reason.store(exit_reason as i32, Ordering::SeqCst);
    }
    pub fn get_exit_reason(&self) -> ExitReason
    {
        ExitReason::from_i32(self.exit_reason.load(Ordering::SeqCst))
    }
}
impl<TCliArgs: CliArgs> Drop for AppRun<TCliArgs>
{
    fn drop(&mut self)
    {
        log::info!(target: "app",
            "Exiting {} (PID {}) at {} with reason {:?}",
            self.app_name,
            self.pid,
            chrono::Local::now(),
            self.get_exit_reason());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitReason
{
    Unset = !1, // this should never be set
    NormalExit = 0,
    InvalidInput = 2,
    Panic = -99,
}
impl ExitReason
{
    fn from_i32(value: i32) -> Self
    {
        match value
        {
            0 => Self::NormalExit,
            2 => Self::InvalidInput,
            -99 => Self::Panic,
            _ => Self::Unset,
        }
    }
}
impl std::process::Termination for ExitReason
{
    fn report(self) -> ExitCode
    {
        (self as u8).into()
    }
}

pub trait FatalErrorCode: Debug
{
    fn error_code(&self) -> u16;
}

#[derive(Clone, Copy)]
struct Panic<'p>(&'p PanicHookInfo<'p>);
impl FatalErrorCode for Panic<'_> { fn error_code(&self) -> u16 { 1u16 } }
impl Debug for Panic<'_>
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        if let Some(payload_str) = self.0.payload().downcast_ref::<&str>()
        {
            f.write_fmt(format_args!("{payload_str}\n"))?;
        }
        else if let Some(payload_str) = self.0.payload().downcast_ref::<String>()
        {
            f.write_fmt(format_args!("{payload_str}\n"))?;
        }

        if let Some(location) = self.0.location()
        {
            Debug::fmt(&location, f)?
        }

        Ok(())
    }
}

pub fn set_panic_hook()
{
    let default_panic_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic|
    {
        default_panic_hook(panic);
        fatal_error(FatalError::Panic, Panic(panic))
    }));
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FatalError
{
    Panic,
    InvalidGraph,
}
impl FatalError
{
    #[must_use]
    pub const fn short_name(self) -> &'static str
    {
        match self
        {
            Self::Panic => "PNC",
            Self::InvalidGraph => "GRF",
        }
    }
}

// Exit the app with a fatal error
pub fn fatal_error(fatal_error: FatalError, code: impl FatalErrorCode) -> !
{
    let mut error_msg = format!("{}-{:04X}", fatal_error.short_name(), code.error_code());
    if cfg!(debug_assertions)
    {
        error_msg.push_str(&format!("\n\n{:#?}", &code));
    }

    log::error!("!!! FATAL: {}", error_msg);

    log::error!("Exiting (PID {}) at {} with reason {:?}",
        std::process::id(),
        chrono::Local::now(),
        ExitReason::Panic);

    std::process::exit(ExitReason::Panic as i32)
}
