use github_mcp_server::cli;
use github_mcp_server::config::Config;
use github_mcp_server::translations::Translator;
use github_mcp_server::{docs, github, resources::ResourceCatalog, server};
use log::error;
use std::process::ExitCode;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();
    let opts = cli::options(&matches);

    if opts.version {
        println!("github-mcp-server {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let cfg = match Config::load(&opts.flags) {
        Ok(cfg) => cfg,
        Err(e) => {
            cli::init_logging(opts.flags.log_level.as_deref());
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    cli::init_logging(cfg.log_level.as_deref());

    match run(&cfg, opts.generate_docs).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: &Config, generate_docs: bool) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let translator = Translator::load(&cwd)?;

    if generate_docs {
        let tools: Vec<_> = github::default_toolsets(&translator)
            .into_iter()
            .flat_map(|s| s.tools)
            .collect();
        print!("{}", docs::convert(&tools));
        return Ok(());
    }

    if cfg.export_translations {
        // Registering everything resolves every key once.
        github::default_toolsets(&translator);
        github::dynamic::tools(&translator);
        ResourceCatalog::new(&translator)?;
        translator.export(&cwd)?;
        return Ok(());
    }

    server::run(cfg, &translator).await
}
