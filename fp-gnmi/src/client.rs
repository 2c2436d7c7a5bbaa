//! gNMI client with latency injection.

use fp_latency::{
    DelayedStream, StreamLatencyInterceptor, UnaryLatencyInterceptor, set_cancellation,
    set_latency,
};
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::Streaming;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::{debug, info, warn};

use crate::config::GnmiTarget;
use crate::error::{GnmiError, Result};
use crate::gnmi::{
    self, CapabilityRequest, CapabilityResponse, GetRequest, GetResponse, SetRequest, SetResponse,
    SubscribeRequest, SubscribeResponse, SubscriptionList, TypedValue, Update,
    g_nmi_client::GNmiClient, get_request::DataType, typed_value::Value,
};
use crate::path::parse_path;

/// Stream of subscription responses, delayed per the target's latency.
pub type SubscribeStream = DelayedStream<Streaming<SubscribeResponse>>;

/// One modification in a gNMI Set.
#[derive(Debug, Clone, PartialEq)]
pub enum SetOperation {
    /// Merge a JSON value at the path.
    Update { path: String, value: serde_json::Value },
    /// Replace the subtree at the path with a JSON value.
    Replace { path: String, value: serde_json::Value },
    /// Delete the subtree at the path.
    Delete { path: String },
}

impl SetOperation {
    /// Parse a `path=json` argument, as given on the command line.
    pub fn parse_assignment(arg: &str) -> Result<(String, serde_json::Value)> {
        // Split on the first '=' outside key selectors, since key values
        // may contain '=' too.
        let mut in_key = false;
        let mut escaped = false;
        let mut split = None;
        for (i, c) in arg.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_key => escaped = true,
                '[' if !in_key => in_key = true,
                ']' if in_key => in_key = false,
                '=' if !in_key => {
                    split = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let Some(split) = split else {
            return Err(GnmiError::InvalidPath {
                path: arg.to_string(),
                reason: "expected <path>=<json value>".to_string(),
            });
        };
        let (path, raw) = (&arg[..split], &arg[split + 1..]);

        let value = serde_json::from_str(raw).map_err(|source| GnmiError::InvalidValue {
            path: path.to_string(),
            source,
        })?;
        Ok((path.to_string(), value))
    }
}

/// gNMI client bound to one target.
///
/// Credentials and the configured latency are attached as metadata to
/// every request. Unary calls go through [`UnaryLatencyInterceptor`],
/// subscriptions through [`StreamLatencyInterceptor`].
#[derive(Clone)]
pub struct GnmiClient {
    target: GnmiTarget,
    inner: GNmiClient<Channel>,
    unary: UnaryLatencyInterceptor,
    stream: StreamLatencyInterceptor,
    token: Option<CancellationToken>,
}

impl GnmiClient {
    /// Connect to the target described by `target`.
    pub async fn connect(target: GnmiTarget) -> Result<Self> {
        let channel = connect_channel(&target).await?;
        Ok(Self::from_channel(target, channel))
    }

    /// Wrap an already established channel.
    pub fn from_channel(target: GnmiTarget, channel: Channel) -> Self {
        if let Some(latency) = &target.latency {
            info!(target_name = %target.name, %latency, "Injecting latency on gNMI calls");
        }
        Self {
            target,
            inner: GNmiClient::new(channel),
            unary: UnaryLatencyInterceptor::new(),
            stream: StreamLatencyInterceptor::new(),
            token: None,
        }
    }

    /// Bind unary calls to `token`: an injected delay is abandoned with
    /// `Cancelled` once the token fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.unary = UnaryLatencyInterceptor::cancellable();
        self.token = Some(token);
        self
    }

    pub fn target(&self) -> &GnmiTarget {
        &self.target
    }

    /// Build a request carrying credentials and latency metadata.
    fn request<T>(&self, message: T) -> Result<Request<T>> {
        let mut request = Request::new(message);

        if let Some(creds) = &self.target.credentials {
            request
                .metadata_mut()
                .insert("username", metadata_value("username", &creds.username)?);
            request
                .metadata_mut()
                .insert("password", metadata_value("password", &creds.password)?);
        }

        if let Some(latency) = &self.target.latency {
            set_latency(&mut request, latency).map_err(|_| GnmiError::InvalidMetadata {
                key: fp_latency::LATENCY_KEY.to_string(),
            })?;
        }

        if let Some(token) = &self.token {
            set_cancellation(&mut request, token.clone());
        }

        Ok(request)
    }

    /// Query the models and encodings the target supports.
    pub async fn capabilities(&self) -> Result<CapabilityResponse> {
        let request = self.request(CapabilityRequest {})?;
        let mut client = self.inner.clone();

        let response = self
            .unary
            .intercept(request, move |req| async move {
                client.capabilities(req).await
            })
            .await?;
        Ok(response.into_inner())
    }

    /// Fetch the given paths.
    pub async fn get(&self, paths: &[String], data_type: DataType) -> Result<GetResponse> {
        let path = paths
            .iter()
            .map(|p| parse_path(p))
            .collect::<Result<Vec<_>>>()?;

        let request = self.request(GetRequest {
            prefix: None,
            path,
            r#type: data_type as i32,
            encoding: self.target.encoding.to_proto(),
            use_models: vec![],
        })?;
        let mut client = self.inner.clone();

        debug!(target_name = %self.target.name, ?paths, "gNMI Get");
        let response = self
            .unary
            .intercept(request, move |req| async move { client.get(req).await })
            .await?;
        Ok(response.into_inner())
    }

    /// Apply a set of modifications in a single transaction.
    pub async fn set(&self, operations: &[SetOperation]) -> Result<SetResponse> {
        let mut set = SetRequest::default();

        for op in operations {
            match op {
                SetOperation::Update { path, value } => set.update.push(json_update(path, value)?),
                SetOperation::Replace { path, value } => {
                    set.replace.push(json_update(path, value)?)
                }
                SetOperation::Delete { path } => set.delete.push(parse_path(path)?),
            }
        }

        let request = self.request(set)?;
        let mut client = self.inner.clone();

        debug!(target_name = %self.target.name, count = operations.len(), "gNMI Set");
        let response = self
            .unary
            .intercept(request, move |req| async move { client.set(req).await })
            .await?;
        Ok(response.into_inner())
    }

    /// Subscribe to the target's configured subscriptions.
    ///
    /// Cancelling `token` ends the returned stream, including while it is
    /// waiting out an injected delay.
    pub async fn subscribe(&self, token: CancellationToken) -> Result<SubscribeStream> {
        let request = self.build_subscribe_request()?;
        self.subscribe_with(request, token).await
    }

    /// Send an explicit subscribe request.
    pub async fn subscribe_with(
        &self,
        subscribe: SubscribeRequest,
        token: CancellationToken,
    ) -> Result<SubscribeStream> {
        let mut request = self.request(tokio_stream::once(subscribe))?;
        set_cancellation(&mut request, token);
        let mut client = self.inner.clone();

        let response = self
            .stream
            .intercept(request, move |req| async move {
                client.subscribe(req).await
            })
            .await?;

        info!(target_name = %self.target.name, "gNMI subscription established");
        Ok(response.into_inner())
    }

    pub fn build_subscribe_request(&self) -> Result<SubscribeRequest> {
        let subscription = self
            .target
            .subscriptions
            .iter()
            .map(|sub| {
                Ok(gnmi::Subscription {
                    path: Some(parse_path(&sub.path)?),
                    mode: sub.mode.to_proto(),
                    sample_interval: sub.sample_interval_ms * 1_000_000, // Convert to nanoseconds
                    suppress_redundant: sub.suppress_redundant,
                    heartbeat_interval: sub.heartbeat_interval_ms * 1_000_000,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let subscription_list = SubscriptionList {
            prefix: None,
            subscription,
            mode: self.target.list_mode.to_proto(),
            encoding: self.target.encoding.to_proto(),
            ..Default::default()
        };

        Ok(SubscribeRequest {
            request: Some(gnmi::subscribe_request::Request::Subscribe(
                subscription_list,
            )),
        })
    }
}

fn metadata_value(key: &str, value: &str) -> Result<AsciiMetadataValue> {
    value.parse().map_err(|_| GnmiError::InvalidMetadata {
        key: key.to_string(),
    })
}

fn json_update(path: &str, value: &serde_json::Value) -> Result<Update> {
    Ok(Update {
        path: Some(parse_path(path)?),
        val: Some(TypedValue {
            value: Some(Value::JsonIetfVal(serde_json::to_vec(value)?)),
        }),
        duplicates: 0,
    })
}

async fn connect_channel(target: &GnmiTarget) -> Result<Channel> {
    let scheme = if target.tls.enabled { "https" } else { "http" };
    let uri = format!("{}://{}", scheme, target.address);

    let mut endpoint = Endpoint::from_shared(uri)?.connect_timeout(target.connect_timeout());

    if target.tls.enabled {
        let mut tls_config = ClientTlsConfig::new().with_native_roots();

        if let Some(server_name) = &target.tls.server_name {
            tls_config = tls_config.domain_name(server_name.clone());
        }

        if let Some(ca_cert_path) = &target.tls.ca_cert {
            let ca_cert = tokio::fs::read(ca_cert_path).await?;
            tls_config = tls_config.ca_certificate(Certificate::from_pem(ca_cert));
        }

        if let (Some(cert_path), Some(key_path)) = (&target.tls.client_cert, &target.tls.client_key)
        {
            let cert = tokio::fs::read(cert_path).await?;
            let key = tokio::fs::read(key_path).await?;
            tls_config = tls_config.identity(Identity::from_pem(cert, key));
        }

        endpoint = endpoint.tls_config(tls_config)?;
    } else if target.credentials.is_some() {
        warn!(target_name = %target.name, "Sending credentials over a plaintext channel");
    }

    info!(target_name = %target.name, address = %target.address, "Connecting to gNMI target");
    let channel = endpoint.connect().await?;
    Ok(channel)
}
