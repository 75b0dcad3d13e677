//! Turns the apiserver's watch stream for `TargetApp` into the
//! `TargetAppEvent` stream `Controller::run_watch` consumes.

use crate::resource::TargetApp;
use futures::{Stream, StreamExt};
use kco_common::event::TargetAppEvent;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client};

/// Build the `TargetAppEvent` stream for the whole cluster, or a single
/// namespace when `namespace` is non-empty.
pub fn watch_target_apps(client: Client, namespace: &str) -> impl Stream<Item = TargetAppEvent> {
    let api: Api<TargetApp> = if namespace.is_empty() {
        Api::all(client)
    } else {
        Api::namespaced(client, namespace)
    };

    watcher::watcher(api, watcher::Config::default()).filter_map(|result| async move {
        match result {
            Ok(Event::Apply(tapp)) | Ok(Event::InitApply(tapp)) => to_applied(tapp),
            Ok(Event::Delete(tapp)) => to_deleted(tapp),
            Ok(Event::Init) | Ok(Event::InitDone) => None,
            Err(err) => {
                tracing::warn!(error = %err, "TargetApp watch stream error");
                None
            }
        }
    })
}

fn to_applied(tapp: TargetApp) -> Option<TargetAppEvent> {
    let namespace = tapp.metadata.namespace.clone()?;
    let name = tapp.metadata.name.clone()?;
    let spec = serde_json::to_value(&tapp.spec).ok()?;
    Some(TargetAppEvent::Applied { namespace, name, spec })
}

fn to_deleted(tapp: TargetApp) -> Option<TargetAppEvent> {
    let namespace = tapp.metadata.namespace.clone()?;
    let name = tapp.metadata.name.clone()?;
    Some(TargetAppEvent::Deleted { namespace, name })
}
