//! Botio command-line front end.
//!
//! `botio server` runs the RPC server and the HTTP/JSON gateway,
//! `botio bot` runs a chat bot against a running server, and the remaining
//! subcommands are a small admin client.

mod cli;
mod gateway;
mod handler;
mod table;

use anyhow::{Context, Result};
use botio_bots::{Bot, DiscordBot, TelegramApi, TelegramBot};
use botio_core::{BotioClient, BotioServer, Command, ServerConfig};
use clap::Parser;
use cli::{BotArgs, ClientArgs, Cli, Commands, Platform, ServerArgs};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if cli.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    match cli.command {
        Commands::Server(args) => run_server(args).await,
        Commands::Bot(args) => run_bot(args).await,
        Commands::Add(args) => {
            client(&args.client)
                .add_command(Command::new(args.command.clone(), args.response))
                .await?;
            println!("Added {:?}", args.command);
            Ok(())
        }
        Commands::Get(args) => {
            let command = client(&args.client).get_command(&args.command).await?;
            print!("{}", table::render(&[command]));
            Ok(())
        }
        Commands::List(args) => {
            let commands = client(&args).list_commands().await?;
            print!("{}", table::render(&commands));
            Ok(())
        }
        Commands::Update(args) => {
            client(&args.client)
                .update_command(Command::new(args.command.clone(), args.response))
                .await?;
            println!("Updated {:?}", args.command);
            Ok(())
        }
        Commands::Delete(args) => {
            client(&args.client).delete_command(&args.command).await?;
            println!("Deleted {:?}", args.command);
            Ok(())
        }
    }
}

fn client(args: &ClientArgs) -> BotioClient {
    BotioClient::new(args.addr.clone(), args.token.clone())
}

async fn run_server(args: ServerArgs) -> Result<()> {
    info!("Starting Botio server");

    let config = ServerConfig::new(args.token.clone())
        .with_store(args.store_config())
        .with_cache_capacity(args.cache_capacity)
        .with_listen_addr(args.listen.clone());
    let server = BotioServer::start(config)
        .await
        .context("failed to start the RPC server")?;

    let gateway = if args.no_http {
        None
    } else {
        match gateway::start(&args.http, server.service().clone(), server.auth().clone()).await {
            Ok(gateway) => Some(gateway),
            Err(e) => {
                if let Err(close_err) = server.shutdown().await {
                    error!("Failed to stop server after gateway error: {}", close_err);
                }
                return Err(e).context("failed to start the HTTP gateway");
            }
        }
    };

    // Machine-readable addresses on stdout; logs go to stderr.
    println!("RPC_ADDR={}", server.addr());
    if let Some(gateway) = &gateway {
        println!("GATEWAY_ADDR={}", gateway.addr());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Some(gateway) = gateway {
        gateway.shutdown().await;
    }
    server.shutdown().await?;
    Ok(())
}

async fn run_bot(args: BotArgs) -> Result<()> {
    let resolver = Arc::new(client(&args.client));

    let bot: Arc<dyn Bot> = match args.platform {
        Platform::Telegram => {
            let api = TelegramApi::new(&args.platform_token)?;
            Arc::new(TelegramBot::new(api, resolver, args.queue_capacity)?.with_fallback(args.resp))
        }
        Platform::Discord => Arc::new(
            DiscordBot::new(
                &args.platform_token,
                resolver,
                args.queue_capacity,
                Some(args.resp),
            )
            .await?,
        ),
    };

    info!("Starting {} bot against {}", bot.name(), args.client.addr);
    let running = Arc::clone(&bot);
    let mut task = tokio::spawn(async move { running.run().await });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received");
        }
        finished = &mut task => {
            bot.stop().await?;
            return finished.context("bot task panicked")?.map_err(Into::into);
        }
    }

    bot.stop().await?;
    task.await.context("bot task panicked")??;
    Ok(())
}
