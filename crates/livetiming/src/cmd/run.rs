use std::io;
use std::sync::Arc;

use livetiming::credentials::CredentialStore;
use livetiming::record::JsonlSink;
use livetiming::session::{ClientConfig, Connection, Dispatcher, FrameSink, NullSink, Session, SessionError};
use livetiming::transport::{connect_live, FirebaseRef, HttpClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{load_catalog, parse_duration, RunArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, AUTH_FAILED, SUCCESS};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_window = parse_duration(&args.poll_window)?;
    let catalog = Arc::new(load_catalog(args.catalog.as_deref())?);

    let store = CredentialStore::new(&args.credentials);
    let credentials = store
        .obtain(io::stdin().lock(), io::stderr())
        .map_err(|err| io_error(&format!("credentials {}", store.path().display()), err))?;

    let service = Arc::new(match args.http_base {
        Some(base) => HttpClient::with_base_url(base),
        None => HttpClient::new(&args.host),
    });
    let session = match Session::login(service.as_ref(), &credentials.email, &credentials.password) {
        Ok(session) => session,
        Err(err) if err.is_auth_failure() => {
            if let Err(remove) = store.remove() {
                warn!(error = %remove, "failed to remove rejected credentials");
            }
            return Err(CliError::new(
                AUTH_FAILED,
                format!("{err}; stored credentials removed, please try again"),
            ));
        }
        Err(err) => return Err(session_error("login failed", err)),
    };
    info!(email = %credentials.email, "logged in");

    let sink: Box<dyn FrameSink> = match &args.record {
        Some(path) => Box::new(
            JsonlSink::create(path).map_err(|err| io_error(&format!("record {}", path.display()), err))?,
        ),
        None => Box::new(NullSink),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;

    // The push worker lives on the runtime's blocking pool.
    let root = args.firebase.map(FirebaseRef::new);
    let dispatcher = {
        let _entered = runtime.enter();
        Dispatcher::new(sink, root).map_err(|err| session_error("notifications", err))?
    };

    let config = ClientConfig {
        host: args.host,
        port: args.port,
        poll_window,
        event: args.event,
        ..ClientConfig::default()
    };

    let outcome = runtime.block_on(async move {
        let stream = connect_live(&config.host, config.port)
            .await
            .map_err(SessionError::Transport)?;
        info!(host = %config.host, port = config.port, "connected to live stream");

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                interrupt.cancel();
            }
        });

        Connection::new(config, catalog, service, session, dispatcher)
            .run(stream, cancel)
            .await
    });

    match outcome {
        Ok(stats) => {
            print_stats(&stats, format);
            Ok(SUCCESS)
        }
        Err(err @ SessionError::Disconnected(_)) => Err(session_error("connection lost", err)),
        Err(err) => Err(session_error("stream failed", err)),
    }
}
