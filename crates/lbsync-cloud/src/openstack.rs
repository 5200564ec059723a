//! OpenStack implementation of the [`Cloud`] trait.
//!
//! Talks JSON to the Octavia load-balancing API and the Neutron networking
//! API. Authentication is a pre-issued token passed as `X-Auth-Token`;
//! obtaining that token is left to the caller.

use async_trait::async_trait;
use lbsync_core::{FlavorId, LoadBalancerId, PortId, SecurityGroupId, SubnetId};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::provider::Cloud;
use crate::types::{
    CreateLoadBalancerOpts, LoadBalancerRecord, PortRecord, SecurityGroupRecord, SubnetRecord,
};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// HTTP client for the OpenStack load-balancing and networking services.
#[derive(Debug, Clone)]
pub struct OpenStackCloud {
    client: Client,
    load_balancer_endpoint: String,
    network_endpoint: String,
    auth_token: Option<String>,
}

impl OpenStackCloud {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: CloudConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CloudError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a client with a pre-configured reqwest client.
    #[must_use]
    pub fn with_client(client: Client, config: CloudConfig) -> Self {
        Self {
            client,
            load_balancer_endpoint: config.load_balancer_endpoint.trim_end_matches('/').to_string(),
            network_endpoint: config.network_endpoint.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
        }
    }

    fn load_balancers_url(&self) -> String {
        format!("{}/v2/lbaas/loadbalancers", self.load_balancer_endpoint)
    }

    fn network_url(&self, collection: &str) -> String {
        format!("{}/v2.0/{collection}", self.network_endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header(AUTH_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Send a request and decode a JSON body, mapping 404 to `NotFound`.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| CloudError::Parse(format!("{what}: {e}")));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CloudError::NotFound(what.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, what, body = %body, "OpenStack request failed");
        Err(CloudError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Extract a human-readable message from a Neutron or Octavia error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/NeutronError/message")
                .or_else(|| v.get("faultstring"))
                .or_else(|| v.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no error body".to_string()
            } else {
                body.to_string()
            }
        })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawLoadBalancer {
    id: String,
    #[serde(default)]
    name: Option<String>,
    vip_subnet_id: String,
    vip_port_id: String,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    flavor_id: Option<String>,
    #[serde(default)]
    provisioning_status: Option<String>,
    #[serde(default)]
    operating_status: Option<String>,
}

impl TryFrom<RawLoadBalancer> for LoadBalancerRecord {
    type Error = CloudError;

    fn try_from(raw: RawLoadBalancer) -> Result<Self> {
        Ok(Self {
            id: LoadBalancerId::parse(raw.id)?,
            name: raw.name.unwrap_or_default(),
            vip_subnet_id: SubnetId::parse(raw.vip_subnet_id)?,
            vip_port_id: PortId::parse(raw.vip_port_id)?,
            provider: raw.provider.unwrap_or_default(),
            // Octavia reports "no flavor" as an empty string.
            flavor_id: raw.flavor_id.and_then(|f| FlavorId::parse(f).ok()),
            provisioning_status: raw.provisioning_status.unwrap_or_default(),
            operating_status: raw.operating_status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawSubnet {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    network_id: Option<String>,
    #[serde(default)]
    cidr: Option<String>,
}

impl TryFrom<RawSubnet> for SubnetRecord {
    type Error = CloudError;

    fn try_from(raw: RawSubnet) -> Result<Self> {
        Ok(Self {
            id: SubnetId::parse(raw.id)?,
            name: raw.name.unwrap_or_default(),
            network_id: raw.network_id.unwrap_or_default(),
            cidr: raw.cidr.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawPort {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    security_groups: Vec<String>,
}

impl TryFrom<RawPort> for PortRecord {
    type Error = CloudError;

    fn try_from(raw: RawPort) -> Result<Self> {
        let security_groups = raw
            .security_groups
            .into_iter()
            .map(SecurityGroupId::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            id: PortId::parse(raw.id)?,
            name: raw.name.unwrap_or_default(),
            security_groups,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawSecurityGroup {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<RawSecurityGroup> for SecurityGroupRecord {
    type Error = CloudError;

    fn try_from(raw: RawSecurityGroup) -> Result<Self> {
        Ok(Self {
            id: SecurityGroupId::parse(raw.id)?,
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoadBalancerList {
    loadbalancers: Vec<RawLoadBalancer>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerEnvelope {
    loadbalancer: RawLoadBalancer,
}

#[derive(Debug, Deserialize)]
struct SubnetList {
    subnets: Vec<RawSubnet>,
}

#[derive(Debug, Deserialize)]
struct SubnetEnvelope {
    subnet: RawSubnet,
}

#[derive(Debug, Deserialize)]
struct PortEnvelope {
    port: RawPort,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupList {
    security_groups: Vec<RawSecurityGroup>,
}

#[derive(Debug, Serialize)]
struct CreateLoadBalancerRequest<'a> {
    loadbalancer: &'a CreateLoadBalancerOpts,
}

#[derive(Debug, Serialize)]
struct UpdatePortRequest<'a> {
    port: PortSecurityGroups<'a>,
}

#[derive(Debug, Serialize)]
struct PortSecurityGroups<'a> {
    security_groups: &'a [SecurityGroupId],
}

fn convert_all<R, T>(raw: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = CloudError>,
{
    raw.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl Cloud for OpenStackCloud {
    async fn list_load_balancers(&self, name: &str) -> Result<Vec<LoadBalancerRecord>> {
        let request = self
            .client
            .get(self.load_balancers_url())
            .query(&[("name", name)]);
        let list: LoadBalancerList = self.send_json(request, "load balancers").await?;
        convert_all(list.loadbalancers)
    }

    async fn get_load_balancer(&self, id: &LoadBalancerId) -> Result<LoadBalancerRecord> {
        let url = format!("{}/{id}", self.load_balancers_url());
        let what = format!("load balancer {id}");
        let envelope: LoadBalancerEnvelope = self.send_json(self.client.get(url), &what).await?;
        envelope.loadbalancer.try_into()
    }

    async fn create_load_balancer(
        &self,
        opts: &CreateLoadBalancerOpts,
    ) -> Result<LoadBalancerRecord> {
        let request = self
            .client
            .post(self.load_balancers_url())
            .json(&CreateLoadBalancerRequest { loadbalancer: opts });
        let envelope: LoadBalancerEnvelope = self.send_json(request, "create load balancer").await?;
        tracing::debug!(name = %opts.name, id = %envelope.loadbalancer.id, "Created load balancer");
        envelope.loadbalancer.try_into()
    }

    async fn get_subnet(&self, id: &SubnetId) -> Result<SubnetRecord> {
        let url = format!("{}/{id}", self.network_url("subnets"));
        let what = format!("subnet {id}");
        let envelope: SubnetEnvelope = self.send_json(self.client.get(url), &what).await?;
        envelope.subnet.try_into()
    }

    async fn list_subnets(&self, name: &str) -> Result<Vec<SubnetRecord>> {
        let request = self
            .client
            .get(self.network_url("subnets"))
            .query(&[("name", name)]);
        let list: SubnetList = self.send_json(request, "subnets").await?;
        convert_all(list.subnets)
    }

    async fn list_security_groups(&self, name: &str) -> Result<Vec<SecurityGroupRecord>> {
        let request = self
            .client
            .get(self.network_url("security-groups"))
            .query(&[("name", name)]);
        let list: SecurityGroupList = self.send_json(request, "security groups").await?;
        convert_all(list.security_groups)
    }

    async fn get_port(&self, id: &PortId) -> Result<PortRecord> {
        let url = format!("{}/{id}", self.network_url("ports"));
        let what = format!("port {id}");
        let envelope: PortEnvelope = self.send_json(self.client.get(url), &what).await?;
        envelope.port.try_into()
    }

    async fn update_port_security_groups(
        &self,
        id: &PortId,
        security_groups: &[SecurityGroupId],
    ) -> Result<PortRecord> {
        let url = format!("{}/{id}", self.network_url("ports"));
        let what = format!("port {id}");
        let request = self.client.put(url).json(&UpdatePortRequest {
            port: PortSecurityGroups { security_groups },
        });
        let envelope: PortEnvelope = self.send_json(request, &what).await?;
        envelope.port.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lb_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "vip_subnet_id": "subnet-1",
            "vip_port_id": "port-1",
            "provider": "amphora",
            "flavor_id": "",
            "provisioning_status": "ACTIVE",
            "operating_status": "ONLINE"
        })
    }

    fn cloud_for(server: &MockServer) -> OpenStackCloud {
        OpenStackCloud::new(CloudConfig {
            load_balancer_endpoint: format!("{}/", server.uri()),
            network_endpoint: server.uri(),
            auth_token: Some("token-1".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn list_load_balancers_filters_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/lbaas/loadbalancers"))
            .and(query_param("name", "lb1"))
            .and(header("X-Auth-Token", "token-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "loadbalancers": [lb_json("lb-id-1", "lb1")] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let lbs = cloud_for(&server).list_load_balancers("lb1").await.unwrap();

        assert_eq!(lbs.len(), 1);
        assert_eq!(lbs[0].id.as_str(), "lb-id-1");
        assert_eq!(lbs[0].vip_port_id.as_str(), "port-1");
        assert_eq!(lbs[0].flavor_id, None);
    }

    #[tokio::test]
    async fn create_load_balancer_posts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/lbaas/loadbalancers"))
            .and(body_json(json!({
                "loadbalancer": { "name": "lb1", "vip_subnet_id": "subnet-1", "flavor_id": "f1" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "loadbalancer": {
                    "id": "lb-id-1",
                    "name": "lb1",
                    "vip_subnet_id": "subnet-1",
                    "vip_port_id": "port-1",
                    "provider": "amphora",
                    "flavor_id": "f1",
                    "provisioning_status": "PENDING_CREATE",
                    "operating_status": "OFFLINE"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let opts = CreateLoadBalancerOpts::new("lb1", SubnetId::from("subnet-1"))
            .with_flavor(Some(FlavorId::from("f1")));
        let lb = cloud_for(&server).create_load_balancer(&opts).await.unwrap();

        assert_eq!(lb.provisioning_status, "PENDING_CREATE");
        assert_eq!(lb.flavor_id, Some(FlavorId::from("f1")));
    }

    #[tokio::test]
    async fn update_port_replaces_security_groups() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2.0/ports/port-1"))
            .and(body_json(json!({ "port": { "security_groups": ["sg-1"] } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "port": { "id": "port-1", "name": "vip", "security_groups": ["sg-1"] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let port = cloud_for(&server)
            .update_port_security_groups(&PortId::from("port-1"), &[SecurityGroupId::from("sg-1")])
            .await
            .unwrap();

        assert_eq!(port.security_groups, vec![SecurityGroupId::from("sg-1")]);
    }

    #[tokio::test]
    async fn missing_port_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/ports/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = cloud_for(&server)
            .get_port(&PortId::from("gone"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: port gone");
    }

    #[tokio::test]
    async fn neutron_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/subnets"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "NeutronError": { "type": "Internal", "message": "database is down", "detail": "" }
            })))
            .mount(&server)
            .await;

        let err = cloud_for(&server).list_subnets("nodes").await.unwrap_err();

        match err {
            CloudError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database is down");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/security-groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "security_groups": [{ "id": "", "name": "lb1" }]
            })))
            .mount(&server)
            .await;

        let err = cloud_for(&server)
            .list_security_groups("lb1")
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::InvalidId(_)));
    }

    #[test]
    fn octavia_fault_string_is_extracted() {
        let body = r#"{"faultcode": "Client", "faultstring": "Invalid input", "debuginfo": null}"#;
        assert_eq!(error_message(body), "Invalid input");
        assert_eq!(error_message(""), "no error body");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = CloudConfig {
            load_balancer_endpoint: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            OpenStackCloud::new(config),
            Err(CloudError::Config(_))
        ));
    }
}
