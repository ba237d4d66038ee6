//! The handful of localized strings the daemon itself emits.
//!
//! Everything else the pet says lives in the extension.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

const ZH: &[(&str, &str)] = &[
    ("status.prefix", "状态："),
    ("status.happy", "🐱 开心"),
    ("status.anxious", "😿 有点不安"),
    ("status.sick", "🤒 生病了！"),
    ("status.soul", "👻 灵魂升天..."),
    ("status.paused", "💤 休息中...\n已暂停计时"),
    ("status.sitting", "已久坐："),
    ("status.limit", " / 上限 "),
    ("notification.firstTitle", "🐱 喵~"),
    ("notification.firstMessage", "陪我起来走走吧！已经 {maxWorkTime} 分钟没活动了"),
    ("notification.urgentTitle", "😿 主人再不动我真的要走了…"),
    ("notification.urgentMessage", "已经很久没活动了，快起来救救我吧！"),
    ("notification.restTitle", "✨ 精力恢复！"),
    ("notification.restMessage", "休息结束，我又充满活力啦！"),
    ("notification.levelUpTitle", "🎉 升级啦！"),
    ("notification.levelUpMessage", "恭喜！您的猫咪进化为 {title}"),
    ("levels.l1", "🥚 幼崽猫"),
    ("levels.l2", "🍼 学步猫"),
    ("levels.l3", "🎒 求学猫"),
    ("levels.l4", "🧢 打工猫"),
    ("levels.l5", "👔 经理猫"),
    ("levels.l6", "🎩 老板猫"),
    ("levels.l7", "🧘 禅师猫"),
    ("levels.l8", "😇 天使猫"),
    ("levels.l9", "👑 喵神"),
];

const EN: &[(&str, &str)] = &[
    ("status.prefix", "Status: "),
    ("status.happy", "🐱 Happy"),
    ("status.anxious", "😿 Anxious"),
    ("status.sick", "🤒 Sick!"),
    ("status.soul", "👻 Ascending..."),
    ("status.paused", "💤 Resting...\nTimer Paused"),
    ("status.sitting", "Sitting: "),
    ("status.limit", " / Max "),
    ("notification.firstTitle", "🐱 Meow!"),
    ("notification.firstMessage", "Let's stretch legs! {maxWorkTime} mins passed!"),
    ("notification.urgentTitle", "😿 Owner, please move..."),
    ("notification.urgentMessage", "I've been waiting for too long!"),
    ("notification.restTitle", "✨ Energy Restored!"),
    ("notification.restMessage", "All better now! Ready to crush it?"),
    ("notification.levelUpTitle", "🎉 Level Up!"),
    ("notification.levelUpMessage", "Congrats! Your pet evolved into {title}"),
    ("levels.l1", "🥚 Egg Cat"),
    ("levels.l2", "🍼 Toddler Cat"),
    ("levels.l3", "🎒 Student Cat"),
    ("levels.l4", "🧢 Worker Cat"),
    ("levels.l5", "👔 Manager Cat"),
    ("levels.l6", "🎩 Boss Cat"),
    ("levels.l7", "🧘 Zen Cat"),
    ("levels.l8", "😇 Angel Cat"),
    ("levels.l9", "👑 God Cat"),
];

/// Look up `key`, falling back to the key itself when it is missing.
pub fn t(key: &str, lang: Language) -> String {
    let table = match lang {
        Language::Zh => ZH,
        Language::En => EN,
    };
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Like [`t`], substituting `{name}` placeholders.
pub fn t_with(key: &str, lang: Language, params: &[(&str, &str)]) -> String {
    let mut text = t(key, lang);
    for (name, value) in params {
        text = text.replace(&format!("{{{}}}", name), value);
    }
    text
}
