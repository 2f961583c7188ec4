//! Admin commands: /ban, /unban and /unrestrict, each replying to the
//! message of the user being acted on.

use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, Message, ParseMode, ReplyParameters, User};
use tracing::info;

use crate::messages;

/// Why a moderation command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    ActorNotAdmin,
    TargetIsAdmin,
}

/// Pure authorization rule: only admins moderate, and never each other.
pub fn authorize(admin_ids: &[u64], actor: u64, target: u64) -> Result<(), Refusal> {
    if !admin_ids.contains(&actor) {
        return Err(Refusal::ActorNotAdmin);
    }
    if admin_ids.contains(&target) {
        return Err(Refusal::TargetIsAdmin);
    }
    Ok(())
}

/// Actor and target for a moderation command, or a usage notice when the
/// command was not a reply to anything.
fn participants<'a>(msg: &'a Message) -> Option<(&'a User, &'a User)> {
    let actor = msg.from.as_ref()?;
    let target = msg.reply_to_message().and_then(|m| m.from.as_ref())?;
    Some((actor, target))
}

pub async fn handle_ban(bot: &Bot, msg: &Message, admin_ids: &[u64]) -> anyhow::Result<()> {
    if msg.reply_to_message().is_none() {
        reply_plain(bot, msg, messages::NEEDS_REPLY).await?;
        return Ok(());
    }
    let Some((actor, target)) = participants(msg) else {
        return Ok(());
    };
    match authorize(admin_ids, actor.id.0, target.id.0) {
        Err(Refusal::ActorNotAdmin) => {
            reply_plain(bot, msg, messages::ONLY_ADMINS_BAN).await?;
            return Ok(());
        }
        Err(Refusal::TargetIsAdmin) => {
            reply_plain(bot, msg, messages::CANT_BAN_ADMIN).await?;
            return Ok(());
        }
        Ok(()) => {}
    }

    let mut req = bot.ban_chat_member(msg.chat.id, target.id);
    req.revoke_messages = Some(false);
    req.await?;
    let mention = messages::mention_markdown(target.id.0, &target.first_name);
    reply_markdown(bot, msg, &messages::banned(&mention)).await?;
    info!(
        target = target.id.0,
        chat = msg.chat.id.0,
        actor = actor.id.0,
        "Banned user"
    );
    Ok(())
}

pub async fn handle_unban(bot: &Bot, msg: &Message, admin_ids: &[u64]) -> anyhow::Result<()> {
    if msg.reply_to_message().is_none() {
        reply_plain(bot, msg, messages::NEEDS_REPLY).await?;
        return Ok(());
    }
    let Some((actor, target)) = participants(msg) else {
        return Ok(());
    };
    match authorize(admin_ids, actor.id.0, target.id.0) {
        Err(Refusal::ActorNotAdmin) => {
            reply_plain(bot, msg, messages::ONLY_ADMINS_UNBAN).await?;
            return Ok(());
        }
        Err(Refusal::TargetIsAdmin) => {
            reply_plain(bot, msg, messages::CANT_UNBAN_ADMIN).await?;
            return Ok(());
        }
        Ok(()) => {}
    }

    let mut req = bot.unban_chat_member(msg.chat.id, target.id);
    req.only_if_banned = Some(true);
    req.await?;
    let mention = messages::mention_markdown(target.id.0, &target.first_name);
    reply_markdown(bot, msg, &messages::unbanned(&mention)).await?;
    info!(
        target = target.id.0,
        chat = msg.chat.id.0,
        actor = actor.id.0,
        "Unbanned user"
    );
    Ok(())
}

/// Lift a mute by handing the user back the default send permission.
pub async fn handle_unrestrict(bot: &Bot, msg: &Message, admin_ids: &[u64]) -> anyhow::Result<()> {
    if msg.reply_to_message().is_none() {
        reply_plain(bot, msg, messages::NEEDS_REPLY).await?;
        return Ok(());
    }
    let Some((actor, target)) = participants(msg) else {
        return Ok(());
    };
    match authorize(admin_ids, actor.id.0, target.id.0) {
        Err(Refusal::ActorNotAdmin) => {
            reply_plain(bot, msg, messages::ONLY_ADMINS_UNBAN).await?;
            return Ok(());
        }
        Err(Refusal::TargetIsAdmin) => {
            reply_plain(bot, msg, messages::CANT_UNBAN_ADMIN).await?;
            return Ok(());
        }
        Ok(()) => {}
    }

    bot.restrict_chat_member(msg.chat.id, target.id, ChatPermissions::SEND_MESSAGES)
        .await?;
    let mention = messages::mention_markdown(target.id.0, &target.first_name);
    reply_markdown(bot, msg, &messages::unrestricted(&mention)).await?;
    info!(
        target = target.id.0,
        chat = msg.chat.id.0,
        actor = actor.id.0,
        "Unrestricted user"
    );
    Ok(())
}

async fn reply_plain(bot: &Bot, msg: &Message, text: &str) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

async fn reply_markdown(bot: &Bot, msg: &Message, text: &str) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}
