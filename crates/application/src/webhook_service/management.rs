use super::*;

impl WebhookService {
    /// Creates one webhook, generating a secret when none is supplied.
    pub async fn create_webhook(
        &self,
        actor: &Actor,
        input: CreateWebhookInput,
    ) -> AppResult<Webhook> {
        actor.require_manage()?;

        let secret = match input.secret {
            Some(secret) => WebhookSecret::new(secret)?,
            None => generate_secret()?,
        };

        let webhook = Webhook::new(WebhookInput {
            id: None,
            name: input.name,
            url: input.url,
            description: input.description,
            events: input.events,
            secret,
            headers: input.headers,
            retry_strategy: input.retry_strategy.unwrap_or_default(),
        })?;

        self.repository
            .save_webhook(actor.tenant_id(), webhook.clone())
            .await?;

        info!(
            tenant_id = %actor.tenant_id(),
            webhook_id = %webhook.id(),
            subject = actor.subject(),
            "webhook created"
        );
        Ok(webhook)
    }

    /// Lists webhooks for the actor tenant.
    pub async fn list_webhooks(&self, actor: &Actor) -> AppResult<Vec<Webhook>> {
        self.repository.list_webhooks(actor.tenant_id()).await
    }

    /// Returns one webhook.
    pub async fn find_webhook(&self, actor: &Actor, webhook_id: WebhookId) -> AppResult<Webhook> {
        self.load_webhook(actor.tenant_id(), webhook_id).await
    }

    /// Stops deliveries until reactivated.
    pub async fn pause_webhook(&self, actor: &Actor, webhook_id: WebhookId) -> AppResult<Webhook> {
        actor.require_manage()?;
        let webhook = self
            .repository
            .pause_webhook(actor.tenant_id(), webhook_id)
            .await?
            .ok_or_else(|| not_found(actor.tenant_id(), webhook_id))?;

        info!(
            tenant_id = %actor.tenant_id(),
            webhook_id = %webhook_id,
            subject = actor.subject(),
            "webhook paused"
        );
        Ok(webhook)
    }

    /// Re-enables a paused or failed webhook and clears its failure streak.
    pub async fn reactivate_webhook(
        &self,
        actor: &Actor,
        webhook_id: WebhookId,
    ) -> AppResult<Webhook> {
        actor.require_manage()?;
        let webhook = self
            .repository
            .reactivate_webhook(actor.tenant_id(), webhook_id)
            .await?
            .ok_or_else(|| not_found(actor.tenant_id(), webhook_id))?;

        info!(
            tenant_id = %actor.tenant_id(),
            webhook_id = %webhook_id,
            subject = actor.subject(),
            "webhook reactivated"
        );
        Ok(webhook)
    }

    /// Replaces the signing key; generates one when `secret` is `None`.
    pub async fn rotate_webhook_secret(
        &self,
        actor: &Actor,
        webhook_id: WebhookId,
        secret: Option<String>,
    ) -> AppResult<RotatedWebhookSecret> {
        actor.require_manage()?;
        let secret = match secret {
            Some(secret) => WebhookSecret::new(secret)?,
            None => generate_secret()?,
        };

        let webhook = self
            .repository
            .rotate_webhook_secret(actor.tenant_id(), webhook_id, &secret)
            .await?
            .ok_or_else(|| not_found(actor.tenant_id(), webhook_id))?;

        info!(
            tenant_id = %actor.tenant_id(),
            webhook_id = %webhook_id,
            subject = actor.subject(),
            "webhook secret rotated"
        );
        Ok(RotatedWebhookSecret { webhook, secret })
    }

    /// Deletes one webhook and its delivery log.
    pub async fn delete_webhook(&self, actor: &Actor, webhook_id: WebhookId) -> AppResult<()> {
        actor.require_manage()?;
        if !self
            .repository
            .delete_webhook(actor.tenant_id(), webhook_id)
            .await?
        {
            return Err(not_found(actor.tenant_id(), webhook_id));
        }

        Ok(())
    }

    /// Lists recorded attempts for one webhook, newest first.
    pub async fn list_deliveries(
        &self,
        actor: &Actor,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        if query.limit == 0 || query.limit > 500 {
            return Err(AppError::Validation(
                "limit must be between 1 and 500".to_owned(),
            ));
        }

        self.load_webhook(actor.tenant_id(), webhook_id).await?;
        self.repository
            .list_delivery_attempts(actor.tenant_id(), webhook_id, query)
            .await
    }

    /// Sends a synthetic `webhook.test` event through the signing and retry path.
    ///
    /// Test deliveries ignore event subscriptions and leave health counters untouched.
    pub async fn send_test_delivery(
        &self,
        actor: &Actor,
        webhook_id: WebhookId,
    ) -> AppResult<DeliveryOutcome> {
        actor.require_manage()?;
        let webhook = self.load_webhook(actor.tenant_id(), webhook_id).await?;
        if webhook.status() != WebhookStatus::Active {
            return Err(AppError::Conflict(format!(
                "webhook '{webhook_id}' is {} and cannot receive test deliveries",
                webhook.status().as_str()
            )));
        }

        let data = serde_json::json!({
            "test": true,
            "message": "test delivery",
            "requested_by": actor.subject(),
        });

        self.send_with_retry(actor.tenant_id(), &webhook, TEST_EVENT_TYPE, &data)
            .await
    }

    pub(crate) async fn load_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Webhook> {
        self.repository
            .find_webhook(tenant_id, webhook_id)
            .await?
            .ok_or_else(|| not_found(tenant_id, webhook_id))
    }
}

fn not_found(tenant_id: TenantId, webhook_id: WebhookId) -> AppError {
    AppError::NotFound(format!(
        "webhook '{webhook_id}' does not exist for tenant '{tenant_id}'"
    ))
}

/// Generates a 32-byte random signing key, hex encoded.
fn generate_secret() -> AppResult<WebhookSecret> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|error| {
        AppError::Internal(format!("failed to generate webhook secret: {error}"))
    })?;

    WebhookSecret::new(hex::encode(bytes))
}
