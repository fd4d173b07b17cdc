//! # Memo Actions
//!
//! Typed social actions carried in data-embed outputs. Each payload is a
//! two-byte action prefix followed by the action body:
//!
//! | Action           | Prefix   | Body                                  |
//! |------------------|----------|---------------------------------------|
//! | `SetName`        | `6d 01`  | name (UTF-8)                          |
//! | `Post`           | `6d 02`  | message                               |
//! | `Reply`          | `6d 03`  | parent txid (32) ‖ message            |
//! | `Like`           | `6d 04`  | liked txid (32)                       |
//! | `SetProfileText` | `6d 05`  | profile text                          |
//! | `Follow`         | `6d 06`  | followed pk-hash (20)                 |
//! | `Unfollow`       | `6d 07`  | unfollowed pk-hash (20)               |
//! | `SetProfilePic`  | `6d 0a`  | image URL                             |
//! | `TopicMessage`   | `6d 0c`  | topic length (1) ‖ topic ‖ message    |
//!
//! The whole payload, prefix included, counts toward the payload limit and
//! the fee.

use std::borrow::Cow;

use crate::config::{PK_HASH_LENGTH, TXID_LENGTH};
use crate::crypto::keys::PkHash;
use crate::error::{SpendError, SpendResult};
use crate::transaction::{SpendOutput, TxId};

/// First byte of every action prefix.
pub const MEMO_PROTOCOL_BYTE: u8 = 0x6d;

pub const CODE_SET_NAME: u8 = 0x01;
pub const CODE_POST: u8 = 0x02;
pub const CODE_REPLY: u8 = 0x03;
pub const CODE_LIKE: u8 = 0x04;
pub const CODE_SET_PROFILE_TEXT: u8 = 0x05;
pub const CODE_FOLLOW: u8 = 0x06;
pub const CODE_UNFOLLOW: u8 = 0x07;
pub const CODE_SET_PROFILE_PIC: u8 = 0x0a;
pub const CODE_TOPIC_MESSAGE: u8 = 0x0c;

const IMGUR_HOST: &str = "imgur.com";
const IMGUR_DIRECT_PREFIX: &str = "https://i.imgur.com/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoAction {
    SetName(String),
    Post(String),
    Reply { parent: TxId, message: String },
    Like(TxId),
    SetProfileText(String),
    Follow(PkHash),
    Unfollow(PkHash),
    SetProfilePic(String),
    TopicMessage { topic: String, message: String },
}

impl MemoAction {
    pub fn code(&self) -> u8 {
        match self {
            Self::SetName(_) => CODE_SET_NAME,
            Self::Post(_) => CODE_POST,
            Self::Reply { .. } => CODE_REPLY,
            Self::Like(_) => CODE_LIKE,
            Self::SetProfileText(_) => CODE_SET_PROFILE_TEXT,
            Self::Follow(_) => CODE_FOLLOW,
            Self::Unfollow(_) => CODE_UNFOLLOW,
            Self::SetProfilePic(_) => CODE_SET_PROFILE_PIC,
            Self::TopicMessage { .. } => CODE_TOPIC_MESSAGE,
        }
    }

    /// Prefix followed by body.
    pub fn payload(&self) -> SpendResult<Vec<u8>> {
        let mut payload = vec![MEMO_PROTOCOL_BYTE, self.code()];
        match self {
            Self::SetName(text)
            | Self::Post(text)
            | Self::SetProfileText(text) => payload.extend_from_slice(text.as_bytes()),
            Self::Reply { parent, message } => {
                payload.extend_from_slice(parent.as_bytes());
                payload.extend_from_slice(message.as_bytes());
            }
            Self::Like(txid) => payload.extend_from_slice(txid.as_bytes()),
            Self::Follow(pk_hash) | Self::Unfollow(pk_hash) => {
                payload.extend_from_slice(pk_hash.as_bytes())
            }
            Self::SetProfilePic(url) => {
                let url = normalize_image_url(url)?;
                validate_image_url(&url)?;
                payload.extend_from_slice(url.as_bytes());
            }
            Self::TopicMessage { topic, message } => {
                let len = u8::try_from(topic.len()).map_err(|_| {
                    SpendError::InvalidTransaction(format!(
                        "topic is {} bytes, at most 255 allowed",
                        topic.len()
                    ))
                })?;
                payload.push(len);
                payload.extend_from_slice(topic.as_bytes());
                payload.extend_from_slice(message.as_bytes());
            }
        }
        Ok(payload)
    }

    /// The data-embed output carrying this action.
    pub fn to_output(&self) -> SpendResult<SpendOutput> {
        Ok(SpendOutput::DataEmbed {
            payload: self.payload()?,
        })
    }

    /// Decodes a data-embed payload back into an action.
    pub fn parse(payload: &[u8]) -> SpendResult<Self> {
        let malformed =
            |what: &str| SpendError::InvalidTransaction(format!("memo payload: {what}"));

        let [protocol, code, body @ ..] = payload else {
            return Err(malformed("shorter than prefix"));
        };
        if *protocol != MEMO_PROTOCOL_BYTE {
            return Err(malformed("not a memo action"));
        }
        let text = |bytes: &[u8]| {
            String::from_utf8(bytes.to_vec()).map_err(|_| malformed("body is not UTF-8"))
        };
        let txid = |bytes: &[u8]| {
            <[u8; TXID_LENGTH]>::try_from(bytes)
                .map(TxId::from_bytes)
                .map_err(|_| malformed("bad txid length"))
        };
        let pk_hash = |bytes: &[u8]| {
            (bytes.len() == PK_HASH_LENGTH)
                .then(|| PkHash::try_from_slice(bytes))
                .flatten()
                .ok_or_else(|| malformed("bad pk-hash length"))
        };

        match *code {
            CODE_SET_NAME => Ok(Self::SetName(text(body)?)),
            CODE_POST => Ok(Self::Post(text(body)?)),
            CODE_REPLY => {
                if body.len() < TXID_LENGTH {
                    return Err(malformed("reply without parent txid"));
                }
                let (parent, message) = body.split_at(TXID_LENGTH);
                Ok(Self::Reply {
                    parent: txid(parent)?,
                    message: text(message)?,
                })
            }
            CODE_LIKE => Ok(Self::Like(txid(body)?)),
            CODE_SET_PROFILE_TEXT => Ok(Self::SetProfileText(text(body)?)),
            CODE_FOLLOW => Ok(Self::Follow(pk_hash(body)?)),
            CODE_UNFOLLOW => Ok(Self::Unfollow(pk_hash(body)?)),
            CODE_SET_PROFILE_PIC => Ok(Self::SetProfilePic(text(body)?)),
            CODE_TOPIC_MESSAGE => {
                let Some((&len, rest)) = body.split_first() else {
                    return Err(malformed("topic message without topic"));
                };
                if rest.len() < len as usize {
                    return Err(malformed("topic longer than payload"));
                }
                let (topic, message) = rest.split_at(len as usize);
                Ok(Self::TopicMessage {
                    topic: text(topic)?,
                    message: text(message)?,
                })
            }
            other => Err(malformed(&format!("unknown action code {other:#04x}"))),
        }
    }
}

/// Rewrites an imgur page link (`https://imgur.com/<id>`, or any
/// `<sub>.imgur.com` host) to the direct image `https://i.imgur.com/<id>.jpg`.
/// Other URLs pass through unchanged.
fn normalize_image_url(url: &str) -> SpendResult<Cow<'_, str>> {
    if is_imgur_direct_jpg(url) {
        return Ok(Cow::Borrowed(url));
    }
    let Some((host, path)) = url
        .strip_prefix("https://")
        .and_then(|rest| rest.split_once('/'))
    else {
        return Ok(Cow::Borrowed(url));
    };
    let on_imgur = host == IMGUR_HOST
        || host
            .strip_suffix(IMGUR_HOST)
            .and_then(|sub| sub.strip_suffix('.'))
            .is_some_and(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_lowercase()));
    if !on_imgur {
        return Ok(Cow::Borrowed(url));
    }

    let direct = format!("{IMGUR_DIRECT_PREFIX}{path}.jpg");
    if is_imgur_direct_jpg(&direct) {
        Ok(Cow::Owned(direct))
    } else {
        Err(SpendError::InvalidTransaction(format!(
            "invalid imgur link: {url}"
        )))
    }
}

fn is_imgur_direct_jpg(url: &str) -> bool {
    url.strip_prefix(IMGUR_DIRECT_PREFIX)
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Accepts `http://` or `https://` URLs with no whitespace and not ending
/// in punctuation.
fn validate_image_url(url: &str) -> SpendResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            SpendError::InvalidTransaction("profile pic must be an http(s) URL".into())
        })?;
    let ends_cleanly = rest
        .chars()
        .last()
        .is_some_and(|c| !matches!(c, '.' | '?' | '!' | ',' | ')'));
    if rest.is_empty() || rest.chars().any(char::is_whitespace) || !ends_cleanly {
        return Err(SpendError::InvalidTransaction(format!(
            "malformed profile pic URL: {url}"
        )));
    }
    Ok(())
}
