//! Template-based user-agent generator.
//!
//! Each [`GeneratorType`] maps to a template with placeholders that are filled
//! with random but plausible values:
//!
//! | Placeholder | Meaning                                 |
//! |-------------|-----------------------------------------|
//! | `{major}`   | browser major version                   |
//! | `{build}`   | Chrome/Edge build number                |
//! | `{patch}`   | Chrome/Edge patch number                |
//! | `{os}`      | OS version fragment for the platform    |
//!
//! Version ranges track recent stable releases; old enough to be common,
//! new enough not to stand out.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use rua_core::GeneratorType;

use crate::application::api::useragent::UserAgentProvider;

struct Template {
    pattern: &'static str,
    major: RangeInclusive<u32>,
    os: &'static [&'static str],
}

const WINDOWS: &[&str] = &["Windows NT 10.0; Win64; x64", "Windows NT 10.0; WOW64"];
const MACOS_CHROME: &[&str] = &["10_15_7"];
const MACOS_FIREFOX: &[&str] = &["10.15", "14.5", "15.1"];
const LINUX: &[&str] = &["X11; Linux x86_64", "X11; Ubuntu; Linux x86_64"];
const ANDROID: &[&str] = &["10; K", "13; SM-S911B", "14; Pixel 8"];
const IOS: &[&str] = &["17_5", "17_6_1", "18_1"];
const NONE: &[&str] = &[""];

fn template(kind: GeneratorType) -> Template {
    match kind {
        GeneratorType::ChromeWin => Template {
            pattern: "Mozilla/5.0 ({os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
            major: 120..=131,
            os: WINDOWS,
        },
        GeneratorType::ChromeMac => Template {
            pattern: "Mozilla/5.0 (Macintosh; Intel Mac OS X {os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
            major: 120..=131,
            os: MACOS_CHROME,
        },
        GeneratorType::ChromeLinux => Template {
            pattern: "Mozilla/5.0 ({os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36",
            major: 120..=131,
            os: LINUX,
        },
        GeneratorType::ChromeAndroid => Template {
            pattern: "Mozilla/5.0 (Linux; Android {os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Mobile Safari/537.36",
            major: 120..=131,
            os: ANDROID,
        },
        GeneratorType::FirefoxWin => Template {
            pattern: "Mozilla/5.0 ({os}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
            major: 115..=133,
            os: WINDOWS,
        },
        GeneratorType::FirefoxMac => Template {
            pattern: "Mozilla/5.0 (Macintosh; Intel Mac OS X {os}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
            major: 115..=133,
            os: MACOS_FIREFOX,
        },
        GeneratorType::FirefoxLinux => Template {
            pattern: "Mozilla/5.0 ({os}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0",
            major: 115..=133,
            os: LINUX,
        },
        GeneratorType::FirefoxAndroid => Template {
            pattern: "Mozilla/5.0 (Android {os}; Mobile; rv:{major}.0) Gecko/{major}.0 Firefox/{major}.0",
            major: 115..=133,
            os: &["13", "14"],
        },
        GeneratorType::EdgeWin => Template {
            pattern: "Mozilla/5.0 ({os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36 Edg/{major}.0.{build}.{patch}",
            major: 120..=131,
            os: WINDOWS,
        },
        GeneratorType::SafariMac => Template {
            pattern: "Mozilla/5.0 (Macintosh; Intel Mac OS X {os}) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{major}.{patch} Safari/605.1.15",
            major: 16..=18,
            os: MACOS_CHROME,
        },
        GeneratorType::SafariIphone => Template {
            pattern: "Mozilla/5.0 (iPhone; CPU iPhone OS {os} like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{major}.{patch} Mobile/15E148 Safari/604.1",
            major: 16..=18,
            os: IOS,
        },
    }
}

/// Renders `kind`'s template with values drawn from `rng`.
fn render<R: Rng + ?Sized>(kind: GeneratorType, rng: &mut R) -> String {
    let t = template(kind);
    let os = t.os.choose(rng).copied().unwrap_or_else(|| NONE[0]);
    let major = rng.gen_range(t.major);
    let (build, patch) = if t.pattern.contains("{build}") {
        (rng.gen_range(6000..=6800), rng.gen_range(0..=200))
    } else {
        (0, rng.gen_range(0..=6))
    };
    t.pattern
        .replace("{os}", os)
        .replace("{major}", &major.to_string())
        .replace("{build}", &build.to_string())
        .replace("{patch}", &patch.to_string())
}

/// [`UserAgentProvider`] that renders one of the built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateProvider;

impl UserAgentProvider for TemplateProvider {
    fn generate(&self, types: &BTreeSet<GeneratorType>) -> Option<String> {
        let mut rng = rand::thread_rng();
        let kind = types.iter().copied().choose(&mut rng)?;
        Some(render(kind, &mut rng))
    }
}
