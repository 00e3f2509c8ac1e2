use serde_json::json;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

use crate::cli::{LoadArgs, RouteArgs};
use pixbox::image::Image;
use pixbox::manager::{CompositeImageManager, ImageManager};
use pixbox::request::{ImageRequest, RequestOptions, TargetSize};
use pixbox::task::{Completion, ImageInfo};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn load(dispatcher: Arc<CompositeImageManager>, args: LoadArgs) -> Result<(), AnyError> {
    let target_size = match (args.width, args.height) {
        (Some(width), Some(height)) => Some(TargetSize::new(width, height)),
        _ => None,
    };
    let options = RequestOptions::builder().maybe_target_size(target_size).build();

    // Ctrl+C shuts the dispatcher down; pending loads then report cancellation
    let interrupt = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling outstanding loads");
                dispatcher.invalidate_and_cancel();
            }
        })
    };

    let mut pending = Vec::with_capacity(args.resources.len());
    for resource in args.resources {
        let request = ImageRequest::with_options(resource, options.clone());
        let (tx, rx) = oneshot::channel::<(Option<Image>, ImageInfo)>();
        let completion: Completion = Box::new(move |image, info| {
            let _ = tx.send((image, info));
        });

        let accepted = dispatcher.task_for_request(&request, Some(completion)).is_some();
        pending.push((request, accepted.then_some(rx)));
    }

    for (request, rx) in pending {
        let report = match rx {
            None => json!({ "resource": request.resource.to_string(), "declined": true }),
            Some(rx) => {
                let (image, info) = rx.await?;
                json!({
                    "resource": request.resource.to_string(),
                    "bytes": image.as_ref().map(Image::len),
                    "content_type": image
                        .as_ref()
                        .and_then(Image::content_type)
                        .map(ToString::to_string),
                    "info": info,
                })
            }
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    interrupt.abort();
    dispatcher.invalidate_and_cancel();
    Ok(())
}

pub fn route(dispatcher: &CompositeImageManager, args: RouteArgs) -> Result<(), AnyError> {
    for resource in args.resources {
        let request = ImageRequest::new(resource);
        let manager = dispatcher.route(&request);
        let report = json!({
            "resource": request.resource.to_string(),
            "manager": manager.as_deref().unwrap_or("declined"),
        });
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}
