//! The `serve` command driver: build once, then run the dev loop.
//!
//! Exit codes: 0 normal shutdown, 2 bind failure.

use super::args::BuildArgs;
use crate::core::BuildMode;
use crate::devloop;
use crate::logger;

pub const EXIT_OK: i32 = 0;
pub const EXIT_BIND_FAILURE: i32 = 2;

#[allow(clippy::fn_params_excessive_bools)]
pub fn run(
    mut args: BuildArgs,
    host: Option<String>,
    port: Option<u16>,
    open: bool,
    no_watch: bool,
) -> i32 {
    args.apply_profile();
    logger::set_verbose(args.verbose);
    logger::set_quiet(args.quiet);

    let config = match load_serve_config(&args, host, port, no_watch) {
        Ok(config) => config,
        Err(e) => {
            crate::log!("error"; "{e:#}");
            return super::build::EXIT_FATAL;
        }
    };

    // Initial build in development mode (drafts included).
    let input = super::build::build_input(&config, &args, BuildMode::Development);
    let snapshot = match devloop::run_build(&config, &input) {
        Ok(stats) => {
            if !stats.page_errors.is_empty() {
                crate::log!("warn"; "initial build finished with {} page error(s)",
                    stats.page_errors.len());
            }
            stats.output_snapshot
        }
        Err(e) => {
            crate::log!("error"; "initial build failed: {e:#}");
            // Serve whatever output exists; the watcher can recover.
            rustc_hash::FxHashMap::default()
        }
    };

    // WebSocket endpoint sits next to the HTTP port.
    let ws = match devloop::ws::WsServer::start(config.serve.port + 1) {
        Ok(ws) => ws,
        Err(e) => {
            crate::log!("error"; "{e:#}");
            return EXIT_BIND_FAILURE;
        }
    };

    let http = match devloop::http::serve(
        config.output_dir(),
        &config.serve.host,
        config.serve.port,
        ws.port,
    ) {
        Ok(server) => server,
        Err(e) => {
            crate::log!("error"; "{e:#}");
            return EXIT_BIND_FAILURE;
        }
    };

    crate::log!("serve"; "serving on http://{}", http.addr);
    if open {
        open_browser(&format!("http://{}", http.addr));
    }

    if config.serve.watch {
        if let Err(e) = devloop::run(config, ws, snapshot) {
            crate::log!("error"; "{e:#}");
            return EXIT_BIND_FAILURE;
        }
    } else {
        while !crate::core::is_shutdown() {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
    }
    EXIT_OK
}

fn load_serve_config(
    args: &BuildArgs,
    host: Option<String>,
    port: Option<u16>,
    no_watch: bool,
) -> anyhow::Result<std::sync::Arc<crate::config::SiteConfig>> {
    let cwd = std::env::current_dir()?;
    let mut config = crate::config::SiteConfig::discover(&cwd)?;
    if let Some(output) = &args.output {
        config.build.output_dir = output.clone();
    }
    if args.strict {
        config.build.strict = true;
    }
    if let Some(host) = host {
        config.serve.host = host;
    }
    if let Some(port) = port {
        config.serve.port = port;
    }
    if no_watch {
        config.serve.watch = false;
    }
    Ok(crate::config::init_config(config))
}

fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let opener = "open";
    #[cfg(not(target_os = "macos"))]
    let opener = "xdg-open";

    if let Err(e) = std::process::Command::new(opener).arg(url).spawn() {
        crate::debug!("serve"; "could not open browser: {e}");
    }
}
