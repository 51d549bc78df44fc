//! Garmin SSO sign-in state machine.
//!
//! The flow walks a browser-like sign-in, trades the resulting ticket for an
//! OAuth1 token and exchanges that for an OAuth2 bearer:
//!
//! ```text
//! Unauthenticated -> FetchingConsumerConfig -> NegotiatingEmbed -> AwaitingCsrf
//!   -> SubmittingCredentials -> Ticketed -> ExchangingOAuth1 -> Ready
//! ```
//!
//! Any step may move to `Failed`. Each variant holds only what the following
//! step consumes, so e.g. an exchange without a ticket cannot be expressed.

use std::fmt;

use reqwest::header::{ACCEPT_LANGUAGE, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::credentials::GarminCredentials;
use super::endpoints::GarminEndpoints;
use super::oauth1::OAuth1Signer;
use super::page::{self, LoginPageVerdict};
use super::tokens::{ExchangeResponse, OAuth1Token, OAuth2Token, OAuthConsumer};
use super::{USER_AGENT_BROWSER, USER_AGENT_MOBILE};
use crate::cookies::CookieJar;
use crate::error::{Error, Result};

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
const CLIENT_ID: &str = "GarminConnect";
const WIDGET_ID: &str = "gauth-widget";

/// Position in the sign-in flow.
pub enum LoginStage {
    Unauthenticated,
    FetchingConsumerConfig,
    NegotiatingEmbed {
        consumer: OAuthConsumer,
    },
    AwaitingCsrf {
        consumer: OAuthConsumer,
    },
    SubmittingCredentials {
        consumer: OAuthConsumer,
        csrf: String,
    },
    Ticketed {
        consumer: OAuthConsumer,
        ticket: String,
    },
    ExchangingOAuth1 {
        consumer: OAuthConsumer,
        oauth1: OAuth1Token,
    },
    Ready(LoginOutcome),
    Failed {
        step: &'static str,
        error: Error,
    },
}

impl LoginStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::FetchingConsumerConfig => "fetching_consumer_config",
            Self::NegotiatingEmbed { .. } => "negotiating_embed",
            Self::AwaitingCsrf { .. } => "awaiting_csrf",
            Self::SubmittingCredentials { .. } => "submitting_credentials",
            Self::Ticketed { .. } => "ticketed",
            Self::ExchangingOAuth1 { .. } => "exchanging_oauth1",
            Self::Ready(_) => "ready",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed { .. })
    }
}

impl fmt::Debug for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { step, error } => f
                .debug_struct("Failed")
                .field("step", step)
                .field("error", error)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Token set produced by a complete sign-in.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub consumer: OAuthConsumer,
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

/// Requests that belong to one SSO session: every call sends the language
/// header, replays the jar and absorbs whatever cookies come back.
pub(crate) struct SsoRequests<'a> {
    client: &'a Client,
    jar: &'a mut CookieJar,
}

impl<'a> SsoRequests<'a> {
    pub(crate) fn new(client: &'a Client, jar: &'a mut CookieJar) -> Self {
        Self { client, jar }
    }

    async fn send(&mut self, request: RequestBuilder) -> Result<Response> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        self.jar.apply(&mut headers);

        let response = request.headers(headers).send().await?;
        self.jar.absorb(response.headers());
        Ok(response)
    }

    async fn text(&mut self, request: RequestBuilder) -> Result<String> {
        let response = self.send(request).await?;
        Ok(response.text().await?)
    }

    /// Trade an OAuth1 token for an OAuth2 bearer.
    ///
    /// The OAuth parameters travel in the query string of an empty POST.
    #[instrument(skip_all)]
    pub(crate) async fn exchange(
        &mut self,
        endpoints: &GarminEndpoints,
        consumer: &OAuthConsumer,
        oauth1: &OAuth1Token,
    ) -> Result<OAuth2Token> {
        let url = parse_url(&endpoints.exchange())?;
        let params = OAuth1Signer::new(consumer).sign(&Method::POST, &url, Some(oauth1))?;

        let request = self
            .client
            .post(url)
            .query(params.pairs())
            .header(USER_AGENT, USER_AGENT_MOBILE)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            );

        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = if body.is_empty() {
                "Garmin OAuth2 exchange failed.".to_string()
            } else {
                body
            };
            return Err(Error::new(status, message));
        }

        let exchange: ExchangeResponse = serde_json::from_str(&body)?;
        let token = OAuth2Token::from_exchange(exchange, chrono::Utc::now().timestamp())?;
        debug!(expires_at = token.expires_at, "Obtained Garmin OAuth2 token");
        Ok(token)
    }
}

/// Drives [`LoginStage`] from `Unauthenticated` to a terminal stage.
pub(crate) struct LoginFlow<'a> {
    sso: SsoRequests<'a>,
    endpoints: &'a GarminEndpoints,
    credentials: &'a GarminCredentials,
    /// Consumer cached on the session; filled as soon as it is fetched.
    consumer_cache: &'a mut Option<OAuthConsumer>,
}

impl<'a> LoginFlow<'a> {
    pub(crate) fn new(
        client: &'a Client,
        jar: &'a mut CookieJar,
        endpoints: &'a GarminEndpoints,
        credentials: &'a GarminCredentials,
        consumer_cache: &'a mut Option<OAuthConsumer>,
    ) -> Self {
        Self {
            sso: SsoRequests::new(client, jar),
            endpoints,
            credentials,
            consumer_cache,
        }
    }

    /// Run to completion and return the terminal stage.
    #[instrument(skip(self), fields(identity = %self.credentials.identity()))]
    pub(crate) async fn run(mut self) -> LoginStage {
        let mut stage = LoginStage::Unauthenticated;
        while !stage.is_terminal() {
            stage = self.advance(stage).await;
        }

        match &stage {
            LoginStage::Ready(_) => info!("Garmin sign-in complete"),
            LoginStage::Failed { step, error } => warn!(
                step,
                status = error.status().as_u16(),
                error = %error,
                "Garmin sign-in failed"
            ),
            _ => {}
        }
        stage
    }

    async fn advance(&mut self, stage: LoginStage) -> LoginStage {
        let step = stage.name();
        debug!(step, "Garmin sign-in step");

        let next = match stage {
            LoginStage::Unauthenticated => Ok(match self.consumer_cache.clone() {
                Some(consumer) => LoginStage::NegotiatingEmbed { consumer },
                None => LoginStage::FetchingConsumerConfig,
            }),
            LoginStage::FetchingConsumerConfig => self
                .fetch_consumer()
                .await
                .map(|consumer| LoginStage::NegotiatingEmbed { consumer }),
            LoginStage::NegotiatingEmbed { consumer } => self
                .negotiate_embed()
                .await
                .map(|()| LoginStage::AwaitingCsrf { consumer }),
            LoginStage::AwaitingCsrf { consumer } => self
                .fetch_csrf()
                .await
                .map(|csrf| LoginStage::SubmittingCredentials { consumer, csrf }),
            LoginStage::SubmittingCredentials { consumer, csrf } => self
                .submit_credentials(&csrf)
                .await
                .map(|ticket| LoginStage::Ticketed { consumer, ticket }),
            LoginStage::Ticketed { consumer, ticket } => self
                .preauthorize(&consumer, &ticket)
                .await
                .map(|oauth1| LoginStage::ExchangingOAuth1 { consumer, oauth1 }),
            LoginStage::ExchangingOAuth1 { consumer, oauth1 } => {
                match self.sso.exchange(self.endpoints, &consumer, &oauth1).await {
                    Ok(oauth2) => Ok(LoginStage::Ready(LoginOutcome {
                        consumer,
                        oauth1,
                        oauth2,
                    })),
                    Err(e) => Err(e),
                }
            }
            terminal => Ok(terminal),
        };

        next.unwrap_or_else(|error| LoginStage::Failed { step, error })
    }

    /// Consumer document; fetched outside the SSO session.
    async fn fetch_consumer(&mut self) -> Result<OAuthConsumer> {
        let response = self
            .sso
            .client
            .get(&self.endpoints.consumer_url)
            .header(USER_AGENT, USER_AGENT_MOBILE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::new(
                status,
                "Unable to fetch Garmin OAuth consumer configuration.",
            ));
        }

        let consumer: OAuthConsumer = serde_json::from_str(&response.text().await?)?;
        *self.consumer_cache = Some(consumer.clone());
        Ok(consumer)
    }

    async fn negotiate_embed(&mut self) -> Result<()> {
        let request = self.sso.client.get(&self.endpoints.sso_embed).query(&[
            ("clientId", CLIENT_ID),
            ("locale", "en"),
            ("service", self.endpoints.gc_modern.as_str()),
        ]);
        self.sso.text(request).await?;
        Ok(())
    }

    async fn fetch_csrf(&mut self) -> Result<String> {
        let request = self.sso.client.get(&self.endpoints.signin).query(&[
            ("id", WIDGET_ID),
            ("embedWidget", "true"),
            ("locale", "en"),
            ("gauthHost", self.endpoints.sso_embed.as_str()),
        ]);
        let html = self.sso.text(request).await?;

        page::extract_csrf(&html)
            .map(str::to_string)
            .ok_or_else(|| Error::internal("Unable to find the Garmin CSRF token."))
    }

    async fn submit_credentials(&mut self, csrf: &str) -> Result<String> {
        let embed = self.endpoints.sso_embed.as_str();
        let request = self
            .sso
            .client
            .post(&self.endpoints.signin)
            .query(&[
                ("id", WIDGET_ID),
                ("embedWidget", "true"),
                ("clientId", CLIENT_ID),
                ("locale", "en"),
                ("gauthHost", embed),
                ("service", embed),
                ("source", embed),
                ("redirectAfterAccountLoginUrl", embed),
                ("redirectAfterAccountCreationUrl", embed),
            ])
            .form(&[
                ("username", self.credentials.username()),
                ("password", self.credentials.password()),
                ("embed", "true"),
                ("_csrf", csrf),
            ])
            .header("Dnt", "1")
            .header(reqwest::header::ORIGIN, self.endpoints.sso_origin.as_str())
            .header(reqwest::header::REFERER, self.endpoints.signin.as_str())
            .header(USER_AGENT, USER_AGENT_BROWSER);

        let html = self.sso.text(request).await?;

        match page::inspect_login_response(&html) {
            LoginPageVerdict::Locked(status) => {
                let reason = if status.is_empty() {
                    "Account locked."
                } else {
                    status
                };
                Err(Error::unauthorized(format!(
                    "Garmin sign-in blocked: {}",
                    reason
                )))
            }
            LoginPageVerdict::PhoneVerificationRequired => Err(Error::unauthorized(
                "Garmin requires a phone number update. Sign in manually to finish.",
            )),
            LoginPageVerdict::Ticket(ticket) => Ok(ticket.to_string()),
            LoginPageVerdict::NoTicket => Err(Error::unauthorized(
                "Unable to obtain a Garmin ticket (MFA required?).",
            )),
        }
    }

    async fn preauthorize(&mut self, consumer: &OAuthConsumer, ticket: &str) -> Result<OAuth1Token> {
        let mut url = parse_url(&self.endpoints.preauthorized())?;
        url.query_pairs_mut()
            .append_pair("ticket", ticket)
            .append_pair("login-url", &self.endpoints.sso_embed)
            .append_pair("accepts-mfa-tokens", "true");

        let params = OAuth1Signer::new(consumer).sign(&Method::GET, &url, None)?;
        let request = self
            .sso
            .client
            .get(url)
            .header(AUTHORIZATION, params.header())
            .header(USER_AGENT, USER_AGENT_MOBILE);

        let body = self.sso.text(request).await?;
        OAuth1Token::from_form(&body)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("Invalid Garmin URL {}: {}", raw, e)))
}
