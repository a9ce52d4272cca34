//! The branches deliveries travel between
//!
//! A fixed list, changing it means a new release

/// All known branches, head office first
pub const BRANCHES: [&str; 13] = [
    "本部",
    "リハビリフィットネス大永寺",
    "リハビリフィットネス守山",
    "リハビリフィットネス旭",
    "リハビリフィットネス長久手",
    "Co.メディカルフィットネス旭",
    "Life Up 可児",
    "Think Life守山",
    "Think Life大曽根",
    "Think Life旭",
    "Life Up 訪問看護ステーション可児",
    "訪問看護ステーション守山",
    "訪問看護ステーション旭",
];
