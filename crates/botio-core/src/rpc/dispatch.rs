//! Routes RPC methods to the command service.

use super::protocol::{codes, methods, RpcRequest};
use super::server::RpcDispatch;
use crate::auth::TokenAuth;
use crate::cancel::CallContext;
use crate::models::{BotCommand, BotCommands, CommandRef, Empty};
use crate::service::CommandService;
use crate::{BotioError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Authenticates each request, then calls the matching service operation.
#[derive(Debug, Clone)]
pub struct CommandDispatch {
    service: CommandService,
    auth: TokenAuth,
}

impl CommandDispatch {
    pub fn new(service: CommandService, auth: TokenAuth) -> Self {
        Self { service, auth }
    }
}

fn parse_params<T: DeserializeOwned>(request: &RpcRequest) -> Result<T> {
    let params = request
        .params
        .clone()
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    serde_json::from_value(params).map_err(|e| {
        BotioError::invalid_argument("params", format!("{}: {}", request.method, e))
    })
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait::async_trait]
impl RpcDispatch for CommandDispatch {
    async fn dispatch(&self, request: &RpcRequest, ctx: CallContext) -> Result<serde_json::Value> {
        if request.method == methods::HEALTH {
            return to_value(serde_json::json!({"status": "ok"}));
        }

        if let Err(e) = self.auth.verify(request.token()) {
            warn!("Rejected {} call: {}", request.method, e);
            return Err(e);
        }

        match request.method.as_str() {
            methods::ADD_COMMAND => {
                let cmd: BotCommand = parse_params(request)?;
                self.service.add_command(&ctx, cmd.into()).await?;
                to_value(Empty {})
            }
            methods::GET_COMMAND => {
                let cmd: CommandRef = parse_params(request)?;
                let found = self.service.get_command(&ctx, &cmd.name).await?;
                to_value(BotCommand::from(found))
            }
            methods::LIST_COMMANDS => {
                let _: Empty = parse_params(request)?;
                let all = self.service.list_commands(&ctx).await?;
                to_value(BotCommands::from(all))
            }
            methods::UPDATE_COMMAND => {
                let cmd: BotCommand = parse_params(request)?;
                self.service.update_command(&ctx, cmd.into()).await?;
                to_value(Empty {})
            }
            methods::DELETE_COMMAND => {
                let cmd: CommandRef = parse_params(request)?;
                self.service.delete_command(&ctx, &cmd.name).await?;
                to_value(Empty {})
            }
            other => Err(BotioError::Protocol {
                code: codes::METHOD_NOT_FOUND,
                message: format!("Method not found: {}", other),
            }),
        }
    }
}
