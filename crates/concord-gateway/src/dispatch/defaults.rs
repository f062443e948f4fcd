//! Built-in transformers

use concord_cache::{CacheKind, CacheUpdate, CachedEntity};
use concord_core::{Channel, Guild, Interaction, Message, Ready, Snowflake, User, VoiceState};
use serde::Deserialize;
use serde_json::Value;

use super::{
    EventArgs, ReturnArity, TransformContext, TransformError, Transformed, TransformerEntry,
};

/// `(event, transformer)` pairs installed by `TransformerRegistry::with_defaults`
pub(crate) fn table() -> Vec<(&'static str, TransformerEntry)> {
    vec![
        ("READY", TransformerEntry::single(ready)),
        ("GUILD_CREATE", TransformerEntry::single(guild_create)),
        ("GUILD_UPDATE", TransformerEntry::single(guild_update)),
        ("GUILD_DELETE", TransformerEntry::single(guild_delete)),
        ("CHANNEL_CREATE", TransformerEntry::single(channel_upsert)),
        ("CHANNEL_UPDATE", TransformerEntry::single(channel_upsert)),
        ("CHANNEL_DELETE", TransformerEntry::single(channel_delete)),
        (
            "GUILD_MEMBER_ADD",
            TransformerEntry::new(ReturnArity::Multiple(2), guild_member_add),
        ),
        (
            "GUILD_MEMBER_REMOVE",
            TransformerEntry::new(ReturnArity::Multiple(2), guild_member_remove),
        ),
        ("MESSAGE_CREATE", TransformerEntry::single(message_create)),
        (
            "MESSAGE_DELETE",
            TransformerEntry::new(ReturnArity::Multiple(2), message_delete),
        ),
        ("INTERACTION_CREATE", TransformerEntry::single(interaction_create)),
        ("VOICE_STATE_UPDATE", TransformerEntry::single(voice_state_update)),
        ("USER_UPDATE", TransformerEntry::single(user_update)),
    ]
}

fn parse<T: serde::de::DeserializeOwned>(data: &Value) -> Result<T, TransformError> {
    Ok(T::deserialize(data)?)
}

fn ready(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let ready: Ready = parse(data)?;
    let user = CacheUpdate::set(CachedEntity::User(ready.user.clone()));
    Ok(Transformed::new(EventArgs::single(ready)).with_update(user))
}

fn guild_create(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let guild: Guild = parse(data)?;

    let mut updates = Vec::with_capacity(1 + guild.channels.len() + guild.voice_states.len());
    updates.push(CacheUpdate::set(CachedEntity::Guild(guild.clone())));
    updates.extend(guild.channels.iter().cloned().map(|mut channel| {
        // Channels nested in a guild omit their guild id
        channel.guild_id.get_or_insert(guild.id);
        CacheUpdate::set(CachedEntity::Channel(channel))
    }));
    updates.extend(guild.voice_states.iter().cloned().map(|mut state| {
        state.guild_id.get_or_insert(guild.id);
        CacheUpdate::set(CachedEntity::VoiceState(state))
    }));

    Ok(Transformed::new(EventArgs::single(guild)).with_updates(updates))
}

fn guild_update(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let guild: Guild = parse(data)?;
    let update = CacheUpdate::set(CachedEntity::Guild(guild.clone()));
    Ok(Transformed::new(EventArgs::single(guild)).with_update(update))
}

#[derive(Deserialize)]
struct IdOnly {
    id: Snowflake,
}

fn guild_delete(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let IdOnly { id } = parse(data)?;
    Ok(Transformed::new(EventArgs::single(id)).with_update(CacheUpdate::delete(CacheKind::Guild, id)))
}

fn channel_upsert(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let channel: Channel = parse(data)?;
    let update = CacheUpdate::set(CachedEntity::Channel(channel.clone()));
    Ok(Transformed::new(EventArgs::single(channel)).with_update(update))
}

fn channel_delete(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let channel: Channel = parse(data)?;
    let update = CacheUpdate::delete(CacheKind::Channel, channel.id);
    Ok(Transformed::new(EventArgs::single(channel)).with_update(update))
}

#[derive(Deserialize)]
struct MemberEvent {
    guild_id: Snowflake,
    user: User,
}

fn guild_member_add(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let MemberEvent { guild_id, user } = parse(data)?;
    let update = CacheUpdate::set(CachedEntity::User(user.clone()));
    Ok(Transformed::new(EventArgs::new(vec![guild_id.into(), user.into()])).with_update(update))
}

fn guild_member_remove(
    data: &Value,
    _: &TransformContext<'_>,
) -> Result<Transformed, TransformError> {
    let MemberEvent { guild_id, user } = parse(data)?;
    Ok(Transformed::new(EventArgs::new(vec![guild_id.into(), user.into()])))
}

fn message_create(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let message: Message = parse(data)?;
    let author = CacheUpdate::set(CachedEntity::User(message.author.clone()));
    Ok(Transformed::new(EventArgs::single(message)).with_update(author))
}

#[derive(Deserialize)]
struct MessageDelete {
    id: Snowflake,
    channel_id: Snowflake,
}

fn message_delete(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let MessageDelete { id, channel_id } = parse(data)?;
    Ok(Transformed::new(EventArgs::new(vec![channel_id.into(), id.into()])))
}

fn interaction_create(
    data: &Value,
    _: &TransformContext<'_>,
) -> Result<Transformed, TransformError> {
    let interaction: Interaction = parse(data)?;
    let invoker = interaction
        .invoker()
        .cloned()
        .map(|user| CacheUpdate::set(CachedEntity::User(user)));
    Ok(Transformed::new(EventArgs::single(interaction)).with_updates(invoker))
}

fn voice_state_update(
    data: &Value,
    _: &TransformContext<'_>,
) -> Result<Transformed, TransformError> {
    let state: VoiceState = parse(data)?;
    let update = if state.is_connected() {
        CacheUpdate::set(CachedEntity::VoiceState(state.clone()))
    } else {
        CacheUpdate::delete(CacheKind::VoiceState, state.user_id)
    };
    Ok(Transformed::new(EventArgs::single(state)).with_update(update))
}

fn user_update(data: &Value, _: &TransformContext<'_>) -> Result<Transformed, TransformError> {
    let user: User = parse(data)?;
    let update = CacheUpdate::set(CachedEntity::User(user.clone()));
    Ok(Transformed::new(EventArgs::single(user)).with_update(update))
}
