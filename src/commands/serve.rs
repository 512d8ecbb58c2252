use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures_util::stream::Stream;
use tokio::sync::{RwLock, broadcast};
use tower_http::services::ServeDir;

use crate::{
    ServeArgs,
    build::{
        BuildOptions, Builder, FileWatcher, PathClassifier, SourceStamp, WatchEvent, WatchPaths,
    },
    commands::build::print_summary,
    config::Config,
};

/// The site as last built, guarded so no request sees a half-written rebuild.
struct Built {
    stamp: SourceStamp,
    builder: Arc<Builder>,
}

/// Shared state of the preview server.
struct Preview {
    config_path: PathBuf,
    watch_paths: WatchPaths,
    options: BuildOptions,
    /// Requests hold the read lock while served; rebuilds hold the write lock.
    built: RwLock<Built>,
    reload_tx: broadcast::Sender<()>,
}

impl Preview {
    fn current_stamp(&self) -> SourceStamp {
        SourceStamp::scan(&self.watch_paths)
    }

    /// Rebuild if any source changed since the last build.
    ///
    /// Concurrent callers queue on the write lock; only the first one to
    /// see the stale stamp rebuilds.
    async fn rebuild_if_stale(&self) {
        let mut built = self.built.write().await;
        let stamp = self.current_stamp();
        if built.stamp == stamp {
            return;
        }

        // Pick up config edits; keep the old config if the new one is broken.
        match Config::load_from_file(&self.config_path) {
            Ok(config) => {
                let base_path = Config::base_path(&self.config_path);
                built.builder = Arc::new(Builder::new(config, base_path));
            }
            Err(e) => tracing::error!("config error, keeping previous config: {e}"),
        }

        println!("\nSources changed, rebuilding...");
        let builder = built.builder.clone();
        let options = self.options.clone();
        match tokio::task::spawn_blocking(move || builder.build(&options)).await {
            Ok(Ok(result)) => print_summary("Rebuilt", &result),
            Ok(Err(e)) => eprintln!("Build error: {e}"),
            Err(e) => eprintln!("Build task failed: {e}"),
        }

        // Recorded even when the build failed, so a broken source isn't
        // rebuilt on every request until it changes again.
        built.stamp = stamp;
        let _ = self.reload_tx.send(());
    }
}

/// Serve a request only once the output matches the sources.
async fn ensure_fresh(State(preview): State<Arc<Preview>>, request: Request, next: Next) -> Response {
    let guard = loop {
        let guard = preview.built.read().await;
        if guard.stamp == preview.current_stamp() {
            break guard;
        }
        drop(guard);
        preview.rebuild_if_stale().await;
    };

    let response = next.run(request).await;
    drop(guard);
    response
}

/// SSE handler for live reload notifications.
async fn live_reload_handler(
    State(preview): State<Arc<Preview>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = preview.reload_tx.subscribe();
    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(_) => {
                    yield Ok(Event::default().event("reload").data("reload"));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some messages, but that's fine - we just need the latest
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// The output directory under the site's base path, checked for freshness on
/// every request, plus the live reload endpoint.
fn router(preview: Arc<Preview>, output_dir: &Path, site_base: &str) -> Router {
    let serve_dir = ServeDir::new(output_dir).append_index_html_on_directories(true);
    let site_routes = if site_base.is_empty() {
        Router::new().fallback_service(serve_dir)
    } else {
        Router::new().nest_service(site_base, serve_dir)
    };

    site_routes
        .layer(middleware::from_fn_with_state(preview.clone(), ensure_fresh))
        .route("/_quire/live-reload", get(live_reload_handler))
        .with_state(preview)
}

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let config_path = Config::resolve_path(args.config_file.as_deref())?;
    let config = Config::load_from_file(&config_path)?;

    // Get the base path for resolving relative paths
    let base_path = Config::base_path(&config_path);

    let live_reload = config.dev.live_reload && args.watch;
    let watch_config = config.dev.watch.clone();
    let site_base = config.site.base_path.trim_end_matches('/').to_string();
    let builder = Arc::new(Builder::new(config, base_path));

    // Canonicalize so paths match the ones in file events
    let watch_paths = WatchPaths {
        content_dir: canonical(&builder.content_dir()),
        layouts_dir: canonical(&builder.layouts_dir()),
        config_path: canonical(&config_path),
    };
    let output_dir = builder.output_dir();

    let options = BuildOptions {
        clean: false,
        drafts: args.drafts,
        dev: true,
        live_reload,
    };

    // Build the site first
    println!("Building site...");
    let stamp = SourceStamp::scan(&watch_paths);
    let initial = builder.clone();
    let initial_options = options.clone();
    let result = tokio::task::spawn_blocking(move || initial.build(&initial_options)).await??;
    print_summary("Built", &result);

    // Create broadcast channel for live reload
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let preview = Arc::new(Preview {
        config_path: config_path.clone(),
        watch_paths: watch_paths.clone(),
        options,
        built: RwLock::new(Built { stamp, builder }),
        reload_tx,
    });

    // Set up file watcher if enabled
    let _watcher_handle = if args.watch {
        let classifier = PathClassifier::new(watch_paths.clone(), canonical(&output_dir));
        match FileWatcher::new(&watch_config, &watch_paths, classifier) {
            Ok(watcher) => {
                println!("Watching for changes...");

                let watcher_preview = preview.clone();
                let handle = tokio::runtime::Handle::current();
                Some(tokio::task::spawn_blocking(move || {
                    while let Some(event) = watcher.recv() {
                        match event {
                            WatchEvent::FilesChanged(changes) => {
                                tracing::debug!(?changes, "detected {} change(s)", changes.len());
                                handle.block_on(watcher_preview.rebuild_if_stale());
                            }
                            WatchEvent::Error(e) => {
                                eprintln!("Watch error: {}", e);
                            }
                        }
                    }
                }))
            }
            Err(e) => {
                eprintln!("Warning: Failed to start file watcher: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = router(preview, &output_dir, &site_base);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;

    // Determine the URL to display
    let display_host = if args.bind == "0.0.0.0" {
        "localhost"
    } else {
        &args.bind
    };
    let url = format!("http://{}:{}{}/", display_host, args.port, site_base);

    println!("\nServing site at {}", url);
    println!("Press Ctrl+C to stop\n");

    // Open browser if requested
    if args.open
        && let Err(e) = open::that(&url)
    {
        eprintln!("Failed to open browser: {}", e);
    }

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Fixture {
        dir: tempfile::TempDir,
        preview: Arc<Preview>,
    }

    impl Fixture {
        fn post(&self) -> PathBuf {
            self.dir.path().join("content/hello.md")
        }

        fn output(&self) -> String {
            std::fs::read_to_string(self.dir.path().join("_site/hello/index.html")).unwrap()
        }
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = canonical(dir.path());
        let config_path = root.join("quire.yaml");
        std::fs::write(&config_path, serde_yaml::to_string(&Config::starter("Preview")).unwrap())
            .unwrap();
        std::fs::create_dir_all(root.join("layouts")).unwrap();
        std::fs::write(root.join("layouts/post.html"), "<main>{{ content | safe }}</main>").unwrap();
        std::fs::create_dir_all(root.join("content")).unwrap();
        std::fs::write(root.join("content/hello.md"), "first\n").unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        let builder = Arc::new(Builder::new(config, Config::base_path(&config_path)));
        let watch_paths = WatchPaths {
            content_dir: builder.content_dir(),
            layouts_dir: builder.layouts_dir(),
            config_path: config_path.clone(),
        };
        let options = BuildOptions {
            dev: true,
            ..Default::default()
        };
        let result = builder.build(&options).unwrap();
        assert!(result.is_success(), "{:?}", result.failures);

        let preview = Arc::new(Preview {
            config_path,
            watch_paths: watch_paths.clone(),
            options,
            built: RwLock::new(Built {
                stamp: SourceStamp::scan(&watch_paths),
                builder,
            }),
            reload_tx: broadcast::channel(16).0,
        });
        Fixture { dir, preview }
    }

    #[tokio::test]
    async fn test_rebuild_finishes_before_returning() {
        let fixture = fixture().await;
        let mut reloads = fixture.preview.reload_tx.subscribe();

        std::fs::write(fixture.post(), "second version\n").unwrap();
        fixture.preview.rebuild_if_stale().await;

        assert!(fixture.output().contains("second version"));
        assert!(reloads.try_recv().is_ok());

        fixture.preview.rebuild_if_stale().await;
        assert!(matches!(
            reloads.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_request_after_edit_sees_new_content() {
        let fixture = fixture().await;
        let output_dir = fixture.dir.path().join("_site");
        let app = router(fixture.preview.clone(), &output_dir, "");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        std::fs::write(fixture.post(), "edited before the request\n").unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /hello/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("edited before the request"), "{response}");
    }
}
