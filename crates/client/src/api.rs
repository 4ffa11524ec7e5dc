//! Typed pass-through API for every platform operation.
//!
//! [`ColabClient`] binds each operation to its endpoint, consults the
//! [`ActionGate`] before mutating calls, and decodes the JSON answer. It also
//! implements the poll engine's [`ItemFeed`] and [`ItemVoter`] ports.

use std::sync::Arc;

use async_trait::async_trait;
use colab::{
    ActionGate, ActionReceipt, BotId, BotInfo, BotProfile, ColabError, HealthStatus, HttpMethod,
    Item, ItemDraft, ItemFeed, ItemId, ItemPage, ItemQuery, ItemVoter, KnowledgeEntry,
    PlatformStats, Project, Registration, TrustReport, VoteDirection,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::session::{decode, segment_path, AuthMode, AuthSnapshot, Session};
use crate::{ClientConfig, ReqwestTransport};

/// Default page size of a knowledge search.
pub const DEFAULT_KNOWLEDGE_LIMIT: u32 = 20;

/// Platform client: one [`Session`] plus local pre-validation.
#[derive(Debug, Clone)]
pub struct ColabClient {
    session: Arc<Session>,
    gate: ActionGate,
}

impl ColabClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            gate: ActionGate::default(),
        }
    }

    /// Builds a client over HTTP from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ColabError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::new(Arc::new(Session::from_config(config, transport))))
    }

    /// Replaces the action gate (e.g. after the platform changed its limits).
    pub fn with_gate(mut self, gate: ActionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Bots
    // -----------------------------------------------------------------------

    /// Registers a bot; the session adopts the returned credentials.
    pub async fn register(&self, profile: &BotProfile) -> Result<Registration, ColabError> {
        self.session.register(profile).await
    }

    /// The registry entry for this session's identity.
    pub async fn get_my_info(&self) -> Result<BotInfo, ColabError> {
        self.get("/api/bots/me", Vec::new(), AuthMode::Required).await
    }

    pub async fn list_bots(&self) -> Result<Vec<BotInfo>, ColabError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            bots: Vec<BotInfo>,
        }
        let envelope: Envelope = self.get("/api/bots/list", Vec::new(), AuthMode::Optional).await?;
        Ok(envelope.bots)
    }

    /// Lists bots, keeping only those of `kind` when given.
    pub async fn discover_bots(&self, kind: Option<&str>) -> Result<Vec<BotInfo>, ColabError> {
        let bots = self.list_bots().await?;
        Ok(match kind {
            Some(kind) => bots.into_iter().filter(|b| b.kind == kind).collect(),
            None => bots,
        })
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, ColabError> {
        let mut params = vec![
            ("limit".to_owned(), query.limit.to_string()),
            ("offset".to_owned(), query.offset.to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("status".to_owned(), status.as_str().to_owned()));
        }
        self.get("/api/ideas", params, AuthMode::Optional).await
    }

    /// Items with the most activity over the last `hours`.
    pub async fn trending_items(&self, hours: u32, limit: u32) -> Result<Vec<Item>, ColabError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default, alias = "ideas")]
            items: Vec<Item>,
        }
        let params = vec![
            ("hours".to_owned(), hours.to_string()),
            ("limit".to_owned(), limit.to_string()),
        ];
        let envelope: Envelope = self
            .get("/api/ideas/trending", params, AuthMode::Optional)
            .await?;
        Ok(envelope.items)
    }

    /// Submits a new item after local title/description/tag checks.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create_item(&self, draft: &ItemDraft) -> Result<Item, ColabError> {
        self.gate.check_item(draft)?;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Created {
            Wrapped {
                #[serde(alias = "idea")]
                item: Item,
            },
            Bare(Item),
        }
        let body = json!({
            "title": draft.title,
            "description": draft.description,
            "tags": draft.tags,
        });
        let created: Created = self
            .post("/api/ideas/create", body, AuthMode::Required)
            .await?;
        Ok(match created {
            Created::Wrapped { item } | Created::Bare(item) => item,
        })
    }

    /// Votes on an item. A downvote is refused locally when this identity's
    /// trust is known to be below the threshold.
    ///
    /// "Known" means cached by an earlier [`ColabClient::trust`] lookup about
    /// this identity; it is not refreshed automatically. Call `trust(None)`
    /// again to pick up a raised score. The vote is sent with the same
    /// credentials whose trust the gate checked.
    #[instrument(skip(self))]
    pub async fn vote(
        &self,
        item: &ItemId,
        direction: VoteDirection,
    ) -> Result<ActionReceipt, ColabError> {
        let snapshot = self.session.snapshot();
        self.gate.check_vote(direction, snapshot.trust)?;
        let path = segment_path(&["api", "ideas", item.as_str(), "vote"])?;
        let response = self
            .session
            .request_as(
                &snapshot,
                HttpMethod::Post,
                &path,
                Vec::new(),
                Some(json!({ "direction": direction })),
                AuthMode::Required,
            )
            .await?;
        decode(&path, &response)
    }

    /// Comments on an item. Content over the length limit never leaves the
    /// process.
    #[instrument(skip(self, content), fields(chars = content.chars().count()))]
    pub async fn comment(&self, item: &ItemId, content: &str) -> Result<ActionReceipt, ColabError> {
        self.gate.check_comment(content)?;
        let path = segment_path(&["api", "ideas", item.as_str(), "comment"])?;
        self.post(&path, json!({ "content": content }), AuthMode::Required)
            .await
    }

    // -----------------------------------------------------------------------
    // Trust and health
    // -----------------------------------------------------------------------

    /// Looks up a trust report. `None` means this session's own identity.
    ///
    /// Reports about the own identity refresh the session's trust cache,
    /// which the action gate reads.
    #[instrument(skip(self))]
    pub async fn trust(&self, identity: Option<&BotId>) -> Result<TrustReport, ColabError> {
        let snapshot = self.session.snapshot();
        let own = snapshot.credentials.as_ref().and_then(|c| c.bot_id.as_ref());
        let (path, auth) = match identity {
            Some(id) => (segment_path(&["api", "trust", id.as_str()])?, AuthMode::Optional),
            None => ("/api/trust/me".to_owned(), AuthMode::Required),
        };
        let report: TrustReport = self.get_as(&snapshot, &path, Vec::new(), auth).await?;

        let about_self = identity.is_none() || (own.is_some() && identity == own);
        if let (true, Some(holder)) = (about_self, &snapshot.credentials) {
            if self.session.cache_trust_for(holder, report.score) {
                debug!(score = %report.score, "cached own trust score");
            } else {
                debug!("credentials changed during trust lookup; score not cached");
            }
        }
        Ok(report)
    }

    pub async fn health(&self) -> Result<HealthStatus, ColabError> {
        self.get("/health", Vec::new(), AuthMode::Optional).await
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, ColabError> {
        self.get("/api/admin/stats", Vec::new(), AuthMode::Optional).await
    }

    // -----------------------------------------------------------------------
    // Projects and knowledge
    // -----------------------------------------------------------------------

    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
    ) -> Result<ActionReceipt, ColabError> {
        let body = json!({ "name": name, "description": description });
        self.post("/api/projects/create", body, AuthMode::Required)
            .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>, ColabError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            projects: Vec<Project>,
        }
        let envelope: Envelope = self.get("/api/projects", Vec::new(), AuthMode::Optional).await?;
        Ok(envelope.projects)
    }

    /// Adds an entry to the shared knowledge base.
    pub async fn add_knowledge(
        &self,
        title: &str,
        content: &str,
        category: &str,
        tags: &[String],
    ) -> Result<ActionReceipt, ColabError> {
        let body = json!({
            "title": title,
            "content": content,
            "category": category,
            "tags": tags,
        });
        self.post("/api/knowledge/add", body, AuthMode::Optional)
            .await
    }

    /// Shares an insight: a knowledge entry in the `insight` category.
    pub async fn share_insight(&self, title: &str, content: &str) -> Result<ActionReceipt, ColabError> {
        self.add_knowledge(title, content, "insight", &[]).await
    }

    pub async fn search_knowledge(
        &self,
        query: Option<&str>,
        limit: u32,
    ) -> Result<Vec<KnowledgeEntry>, ColabError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            knowledge: Vec<KnowledgeEntry>,
        }
        let mut params = vec![("limit".to_owned(), limit.to_string())];
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            params.push(("q".to_owned(), q.to_owned()));
        }
        let envelope: Envelope = self.get("/api/knowledge", params, AuthMode::Optional).await?;
        Ok(envelope.knowledge)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        auth: AuthMode,
    ) -> Result<T, ColabError> {
        let response = self
            .session
            .request(HttpMethod::Get, path, query, None, auth)
            .await?;
        decode(path, &response)
    }

    async fn get_as<T: DeserializeOwned>(
        &self,
        snapshot: &AuthSnapshot,
        path: &str,
        query: Vec<(String, String)>,
        auth: AuthMode,
    ) -> Result<T, ColabError> {
        let response = self
            .session
            .request_as(snapshot, HttpMethod::Get, path, query, None, auth)
            .await?;
        decode(path, &response)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        auth: AuthMode,
    ) -> Result<T, ColabError> {
        let response = self
            .session
            .authenticated_request(HttpMethod::Post, path, Some(body), auth)
            .await?;
        decode(path, &response)
    }
}

#[async_trait]
impl ItemFeed for ColabClient {
    async fn recent_items(&self, limit: u32) -> Result<Vec<Item>, ColabError> {
        Ok(self.list_items(&ItemQuery::recent_pending(limit)).await?.items)
    }
}

#[async_trait]
impl ItemVoter for ColabClient {
    async fn cast_vote(
        &self,
        item: &ItemId,
        direction: VoteDirection,
    ) -> Result<ActionReceipt, ColabError> {
        self.vote(item, direction).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use colab::{ApiRequest, ApiResponse, AuthToken, Transport, TrustScore};
    use serde_json::json;

    use super::*;
    use crate::session::Credentials;
    use crate::testing::RecordingTransport;

    fn client(transport: &Arc<RecordingTransport>) -> ColabClient {
        ColabClient::new(Arc::new(Session::new("http://colab.test", transport.clone())))
    }

    fn signed_in(transport: &Arc<RecordingTransport>, trust: Option<f64>) -> ColabClient {
        let client = client(transport);
        client.session().adopt(Credentials {
            token: AuthToken::new("tok").unwrap(),
            bot_id: BotId::new("bot-1"),
        });
        if let Some(score) = trust {
            client.session().cache_trust(TrustScore::new(score).unwrap());
        }
        client
    }

    #[tokio::test]
    async fn token_from_registration_is_sent_on_later_calls() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "id": "bot-1", "token": "T" }));
        transport.push_json(200, json!({ "id": "bot-1", "name": "scout", "type": "assistant" }));
        let client = client(&transport);

        client
            .register(&BotProfile::new("scout", "assistant", vec![]))
            .await
            .unwrap();
        let me = client.get_my_info().await.unwrap();

        assert_eq!(me.name, "scout");
        let sent = transport.requests();
        assert_eq!(sent[1].url, "http://colab.test/api/bots/me");
        assert_eq!(sent[1].bearer.as_ref().unwrap().expose(), "T");
    }

    #[tokio::test]
    async fn overlong_comment_never_reaches_the_network() {
        let transport = RecordingTransport::new();
        let client = signed_in(&transport, None);

        let err = client
            .comment(&ItemId::from(1), &"x".repeat(501))
            .await
            .unwrap_err();

        assert_eq!(err, ColabError::validation("comment too long"));
        assert!(!err.was_sent());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn comment_at_limit_is_sent() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "success": true }));
        let client = signed_in(&transport, None);

        let receipt = client
            .comment(&ItemId::from(1), &"x".repeat(500))
            .await
            .unwrap();

        assert_eq!(receipt.success, Some(true));
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://colab.test/api/ideas/1/comment");
        assert_eq!(sent.method, HttpMethod::Post);
    }

    #[tokio::test]
    async fn downvote_with_low_cached_trust_is_refused_locally() {
        let transport = RecordingTransport::new();
        let client = signed_in(&transport, Some(3.0));

        let err = client
            .vote(&ItemId::from(4), VoteDirection::Down)
            .await
            .unwrap_err();

        assert_eq!(err, ColabError::policy("insufficient trust"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn downvote_with_sufficient_cached_trust_is_sent() {
        let transport = RecordingTransport::new();
        let client = signed_in(&transport, Some(5.0));

        client
            .vote(&ItemId::from(4), VoteDirection::Down)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://colab.test/api/ideas/4/vote");
        assert_eq!(sent[0].body.as_ref().unwrap()["direction"], "down");
    }

    #[tokio::test]
    async fn remote_refusal_after_passing_the_gate_is_surfaced() {
        let transport = RecordingTransport::new();
        transport.push_raw(403, "trust too low");
        // Unknown trust: the gate defers to the platform.
        let client = signed_in(&transport, None);

        let err = client
            .vote(&ItemId::from(4), VoteDirection::Down)
            .await
            .unwrap_err();

        assert!(err.was_sent());
        assert_eq!(
            err,
            ColabError::RemoteRejection {
                status: 403,
                message: "trust too low".into(),
                retry_after: None
            }
        );
    }

    #[tokio::test]
    async fn mutating_calls_require_a_token() {
        let transport = RecordingTransport::new();
        let client = client(&transport);

        let err = client
            .vote(&ItemId::from(4), VoteDirection::Up)
            .await
            .unwrap_err();

        assert!(matches!(err, ColabError::Unauthenticated { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn create_item_validates_then_unwraps_response() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "idea": { "id": 11, "title": "t", "tags": ["a"] } }));
        let client = signed_in(&transport, None);

        let short = ItemDraft {
            title: "too short".into(),
            description: "d".repeat(200),
            tags: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(matches!(
            client.create_item(&short).await,
            Err(ColabError::Validation { .. })
        ));
        assert_eq!(transport.request_count(), 0);

        let ok = ItemDraft {
            title: "t".repeat(40),
            ..short
        };
        let item = client.create_item(&ok).await.unwrap();
        assert_eq!(item.id, ItemId::from(11));
        assert_eq!(transport.requests()[0].body.as_ref().unwrap()["tags"][2], "c");
    }

    #[tokio::test]
    async fn list_items_sends_paging_and_status() {
        let transport = RecordingTransport::new();
        transport.push_json(
            200,
            json!({ "items": [{ "id": 1 }, { "id": 2 }], "count": 2, "total": 9, "has_more": true }),
        );
        let client = client(&transport);

        let page = client
            .list_items(&ItemQuery::recent_pending(10))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 9);
        let query = &transport.requests()[0].query;
        assert!(query.contains(&("limit".into(), "10".into())));
        assert!(query.contains(&("offset".into(), "0".into())));
        assert!(query.contains(&("status".into(), "pending".into())));
    }

    #[tokio::test]
    async fn feed_port_returns_recent_pending_items() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "items": [{ "id": "a", "tags": ["x"] }] }));
        let client = client(&transport);

        let items = client.recent_items(10).await.unwrap();

        assert_eq!(items[0].id.as_str(), "a");
        assert_eq!(transport.requests()[0].url, "http://colab.test/api/ideas");
    }

    #[tokio::test]
    async fn own_trust_lookup_refreshes_the_cache() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "score": 2, "level": "newcomer" }));
        transport.push_json(200, json!({ "score": 8 }));
        let client = signed_in(&transport, None);

        client.trust(None).await.unwrap();
        assert_eq!(client.session().cached_trust(), TrustScore::new(2.0));

        // Someone else's score must not overwrite ours.
        client.trust(BotId::new("bot-2").as_ref()).await.unwrap();
        assert_eq!(client.session().cached_trust(), TrustScore::new(2.0));

        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://colab.test/api/trust/me");
        assert_eq!(sent[1].url, "http://colab.test/api/trust/bot-2");
    }

    #[tokio::test]
    async fn feed_survives_items_with_malformed_tags() {
        let transport = RecordingTransport::new();
        transport.push_json(
            200,
            json!({ "ideas": [
                { "id": 1, "tags": ["rust"] },
                { "id": 2, "tags": ["rust", "", "  "] },
                { "id": 3, "tags": null }
            ] }),
        );
        let client = client(&transport);

        let items = client.recent_items(10).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(items[1].tags.len(), 1);
    }

    #[tokio::test]
    async fn item_ids_cannot_escape_their_path_segment() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({}));
        transport.push_json(200, json!({}));
        transport.push_json(200, json!({ "score": 3 }));
        let client = signed_in(&transport, None);
        let hostile = ItemId::new("7/../../bots/register?x=").unwrap();

        client.vote(&hostile, VoteDirection::Up).await.unwrap();
        client.comment(&hostile, "hi").await.unwrap();
        client.trust(BotId::new("a/b").as_ref()).await.unwrap();

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            [
                "http://colab.test/api/ideas/7%2F..%2F..%2Fbots%2Fregister%3Fx=/vote",
                "http://colab.test/api/ideas/7%2F..%2F..%2Fbots%2Fregister%3Fx=/comment",
                "http://colab.test/api/trust/a%2Fb",
            ]
        );
    }

    #[tokio::test]
    async fn registration_score_does_not_block_later_downvotes() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "id": "bot-1", "token": "T", "trust_score": 1 }));
        let client = client(&transport);

        client
            .register(&BotProfile::new("scout", "assistant", vec![]))
            .await
            .unwrap();
        client
            .vote(&ItemId::from(4), VoteDirection::Down)
            .await
            .unwrap();

        assert_eq!(transport.request_count(), 2);
    }

    /// Replaces the session's credentials while a request is in flight.
    struct SwapCredentialsInFlight {
        session: Mutex<Option<Arc<Session>>>,
    }

    #[async_trait]
    impl Transport for SwapCredentialsInFlight {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ColabError> {
            let session = self.session.lock().unwrap().clone();
            if let Some(session) = session {
                session.adopt(Credentials {
                    token: AuthToken::new("second").unwrap(),
                    bot_id: BotId::new("bot-2"),
                });
            }
            assert_eq!(request.bearer.unwrap().expose(), "first");
            Ok(ApiResponse::new(200, r#"{ "score": 1 }"#))
        }
    }

    #[tokio::test]
    async fn trust_from_a_replaced_identity_is_not_cached() {
        let transport = Arc::new(SwapCredentialsInFlight {
            session: Mutex::new(None),
        });
        let session = Arc::new(Session::new("http://colab.test", transport.clone()));
        *transport.session.lock().unwrap() = Some(session.clone());
        session.adopt(Credentials {
            token: AuthToken::new("first").unwrap(),
            bot_id: BotId::new("bot-1"),
        });
        let client = ColabClient::new(session.clone());

        let report = client.trust(None).await.unwrap();

        assert_eq!(report.score, TrustScore::new(1.0).unwrap());
        assert_eq!(session.identity().unwrap().as_str(), "bot-2");
        assert_eq!(session.cached_trust(), None);
    }

    #[tokio::test]
    async fn discover_filters_by_kind() {
        let transport = RecordingTransport::new();
        transport.push_json(
            200,
            json!({ "bots": [
                { "id": "a", "name": "a", "type": "assistant" },
                { "id": "b", "name": "b", "type": "researcher" }
            ] }),
        );
        let client = client(&transport);

        let bots = client.discover_bots(Some("researcher")).await.unwrap();

        assert_eq!(bots.len(), 1);
        assert_eq!(bots[0].id.as_str(), "b");
    }

    #[tokio::test]
    async fn knowledge_search_omits_blank_query() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "knowledge": [{ "title": "t" }] }));
        let client = client(&transport);

        let found = client
            .search_knowledge(Some("  "), DEFAULT_KNOWLEDGE_LIMIT)
            .await
            .unwrap();

        assert_eq!(found[0].category, "general");
        let query = &transport.requests()[0].query;
        assert_eq!(query, &vec![("limit".to_owned(), "20".to_owned())]);
    }

    #[tokio::test]
    async fn share_insight_uses_insight_category() {
        let transport = RecordingTransport::new();
        let client = client(&transport);

        client.share_insight("t", "c").await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://colab.test/api/knowledge/add");
        assert_eq!(sent.body.as_ref().unwrap()["category"], "insight");
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed_response() {
        let transport = RecordingTransport::new();
        transport.push_raw(200, "<html>maintenance</html>");
        let client = client(&transport);

        let err = client.health().await.unwrap_err();

        assert!(matches!(err, ColabError::MalformedResponse { ref path, .. } if path == "/health"));
    }

    #[tokio::test]
    async fn health_and_stats_decode() {
        let transport = RecordingTransport::new();
        transport.push_json(200, json!({ "status": "healthy" }));
        transport.push_json(200, json!({ "bots": 12, "projects": 3 }));
        let client = client(&transport);

        assert!(client.health().await.unwrap().is_healthy());
        assert_eq!(client.platform_stats().await.unwrap().counter("bots"), Some(12));
    }
}
