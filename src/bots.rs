//! Bot / service account detection with per-run memoization.

use ahash::AHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Accounts known to be bots, services or pseudo users. Exact, case-sensitive names.
pub const KNOWN_BOT_NAMES: &[&str] = &[
    "", "A858DE45F56D9BC9", "AAbot", "ADHDbot", "ALTcointip", "AVR_Modbot", "A_random_gif",
    "AltCodeBot", "Antiracism_Bot", "ApiContraption", "AssHatBot", "AtheismModBot", "AutoInsult",
    "AutoModerator", "BELITipBot", "BadLinguisticsBot", "BanishedBot", "BeetusBot", "BensonTheBot",
    "Bible_Verses_Bot", "BlackjackBot", "BlockchainBot", "Brigade_Bot", "Bronze-Bot",
    "CAH_BLACK_BOT", "CHART_BOT", "CLOSING_PARENTHESIS", "CPTModBot", "Cakeday-Bot", "CalvinBot",
    "CaptionBot", "CarterDugSubLinkBot", "CasualMetricBot", "Chemistry_Bot", "ChristianityBot",
    "Codebreakerbreaker", "Comment_Codebreaker", "CompileBot", "ComplimentingBot",
    "ContentForager", "ConvertsToMetric", "CreepierSmileBot", "CreepySmileBot", "CuteBot6969",
    "DDBotIndia", "DNotesTip", "DRKTipBot", "DefinitelyBot", "DeltaBot", "Dickish_Bot_Bot",
    "Dictionary__Bot", "DidSomeoneSayBoobs", "DogeLotteryModBot", "DogeTipStatsBot",
    "DogeWordCloudBot", "DotaCastingBot", "Downtotes_Plz", "DownvotesMcGoats", "DropBox_Bot",
    "EmmaBot", "Epic_Face_Bot", "EscapistVideoBot", "ExmoBot", "ExplanationBot", "FTFY_Cat",
    "FTFY_Cat6", "Fedora-Tip-Bot", "FedoraTipAutoBot", "FelineFacts", "Fixes_GrammerNazi_",
    "FonsoTheWhitesican", "FriendSafariBot", "FriendlyCamelCaseBot", "FrontpageWatch", "Frown_Bot",
    "GATSBOT", "GWHistoryBot", "GabenCoinTipBot", "GameDealsBot", "Gatherer_bot", "GeekWhackBot",
    "GiantBombBot", "GifAsHTML5", "GoneWildResearcher", "GooglePlusBot", "GotCrypto",
    "GrammerNazi_", "GreasyBacon", "Grumbler_bot", "GunnersGifsBot", "GunnitBot",
    "HCE_Replacement_Bot", "HScard_display_bot", "Handy_Related_Sub", "HighResImageFinder",
    "HockeyGT_Bot", "HowIsThisBestOf_Bot", "IAgreeBot", "ICouldntCareLessBot", "IS_IT_SOLVED",
    "I_BITCOIN_CATS", "I_Say_No_", "Insane_Photo_Bot", "IsItDownBot", "JiffyBot", "JotBot",
    "JumpToBot", "KSPortBot", "KarmaConspiracy_Bot", "Kevin_Garnett_Bot", "Lapis_Mirror",
    "Late_Night_Grumbler", "LazyLinkerBot", "LinkFixerBotSnr", "Link_Correction_Bot",
    "Link_Demobilizer", "Link_Rectifier_Bot", "LinkedCommentBot", "LocationBot", "Lots42",
    "Lunas_Disciple", "MAGNIFIER_BOT", "MTGCardFetcher", "Makes_Small_Text_Bot",
    "Mentioned_Videos", "Meta_Bot", "MetatasticBot", "MetricPleaseBot", "Metric_System_Bot",
    "ModerationLog", "MontrealBot", "MovieGuide", "MultiFunctionBot", "MumeBot", "NASCARThreadBot",
    "NFLVideoBot", "NSLbot", "Nazeem_Bot", "New_Small_Text_Bot", "Nidalee_Bot", "NightMirrorMoon",
    "NoSleepAutoMod", "NoSobStoryBot2", "NobodyDoesThis", "NotRedditEnough",
    "OriginalPostSearcher", "PGN-Bot", "PHOTO_OF_CAPTAIN_RON", "PJRP_Bot", "PhoenixBot",
    "PigLatinsYourComment", "PlayStoreLinks_Bot", "PlaylisterBot", "PleaseRespectTables",
    "PloungeMafiaVoteBot", "PokemonFlairBot", "PoliteBot", "PoliticBot", "PonyTipBot",
    "PornOverlord", "Porygon-Bot", "PresidentObama___", "PriceZombie", "ProselytizerBot",
    "PunknRollBot", "QUICHE-BOT", "RFootballBot", "Random-ComplimentBOT", "RandomTriviaBot",
    "Rangers_Bot", "Readdit_Bot", "Reads_Small_Text_Bot", "RealtechPostBot", "ReddCoinGoldBot",
    "Relevant_News_Bot", "Removedpixel", "RequirementsBot", "RfreebandzBOT", "RiskyClickBot",
    "SERIAL_JOKE_KILLER", "SMCTipBot", "SRD_Notifier", "SRS_History_Bot", "SRScreenshot",
    "SWTOR_Helper_Bot", "SakuraiBot", "SakuraiBot_test", "SatoshiTipBot", "ShadowBannedBot",
    "ShibeBot", "ShillForMonsanto", "Shiny-Bot", "ShittyGandhiQuotes", "ShittyImageBot",
    "SimilarImage", "SketchNotSkit", "SmallTextReader", "Smile_Bot", "Somalia_Bot", "Some_Bot",
    "StackBot", "StarboundBot", "StencilTemplateBOT", "StreetFightMirrorBot", "SuchModBot",
    "SurveyOfRedditBot", "TOP_COMMENT_OF_YORE", "Text_Reader_Bot", "TheNitromeFan",
    "TheSwedishBot", "TipMoonBot", "TitsOrGTFO_Bot", "TotesMessenger", "TweetPoster",
    "Twitch2YouTube", "Unhandy_Related_Sub", "UnobtaniumTipBot", "UrbanDicBot",
    "UselessArithmeticBot", "UselessConversionBot", "User_Simulator", "VerseBot", "VideoLinkBot",
    "VideopokerBot", "VsauceBot", "WWE_Network_Bot", "WeAppreciateYou", "Website_Mirror_Bot",
    "WeeaBot", "WhoWouldWinBot", "Wiki_Bot", "Wiki_FirstPara_bot", "WikipediaCitationBot",
    "Wink-Bot", "WordCloudBot2", "WritingPromptsBot", "XPostLinker", "X_BOT", "YT_Bot",
    "[deleted]", "_Definition_Bot_", "_FallacyBot_", "_Rita_", "__bot__", "albumbot",
    "allinonebot", "annoying_yes_bot", "asmrspambot", "astro-bot", "atomicimploder", "auto-doge",
    "automoderator", "autotldr", "autourbanbot", "autowikibot", "bRMT_Bot", "bad_ball_ban_bot",
    "ban_pruner", "baseball_gif_bot", "beecointipbot", "bitcoinpartybot", "bitcointip",
    "bitofnewsbot", "bocketybot", "c5bot", "cRedditBot", "callfloodbot", "callibot",
    "canada_goose_tip_bot", "changetip", "cheesecointipbot", "chromabot", "classybot",
    "coinflipbot", "coinyetipper", "colorcodebot", "comment_copier_bot", "compilebot",
    "conspirobot", "creepiersmilebot", "cris9696", "cruise_bot", "d3posterbot", "ddlbot",
    "define_bot", "demobilizer", "dgctipbot", "digitipbot", "disapprovalbot", "dogetipbot",
    "earthtipbot", "edmprobot", "elMatadero_bot", "elwh392", "expired_link_bot", "fa_mirror",
    "fact_check_bot", "faketipbot", "fedora_tip_bot", "fedoratips", "flappytip", "flips_title",
    "foreigneducationbot", "frytipbot", "fsctipbot", "gabenizer-bot", "gabentipbot", "gfy_bot",
    "gfycat-bot-sucksdick", "gifster_bot", "gives_you_boobies", "givesafuckbot", "gocougs_bot",
    "godwin_finder", "golferbot", "gracefulcharitybot", "gracefulclaritybot", "gregbot",
    "groompbot", "gunners_gif_bot", "haiku_robot", "havoc_bot", "hearing-aid_bot",
    "hearing_aid_bot", "hearingaid_bot", "hit_bot", "hockey_gif_bot", "howstat", "hwsbot",
    "iam4real", "imgurHostBot", "imgur_rehosting", "imgurtranscriber", "imirror_bot", "isitupbot",
    "jerkbot-3hunna", "keysteal_bot", "kittehcointipbot", "last_cakeday_bot", "linkfixerbot1",
    "linkfixerbot2", "linkfixerbot3", "loser_detector_bot", "luckoftheshibe", "makesTextSmall",
    "malen-shutup-bot", "malo_the_bot", "matthewrobo", "meme_transcriber", "memedad-transcriber",
    "misconception_fixer", "mma_gif_bot", "mnemosyne-0000", "moderator-bot", "nba_gif_bot",
    "new_eden_news_bot", "nfl_gif_bot", "nhl_gif_bot", "not_alot_bot", "notoverticalvideo",
    "nyantip", "okc_rating_bot", "original-finder", "pandatipbot", "pandatips", "potdealer",
    "provides-id", "qkme_transcriber", "qznc_bot", "rSGSpolice", "r_PictureGame", "raddit-bot",
    "randnumbot", "rarchives", "readsmalltextbot", "red321red321", "redditbots", "redditreviewbot",
    "reddtipbot", "relevantxkcd-bot", "request_bot", "rhiever-bot", "rightsbot", "rnfl_robot",
    "roger_bot", "rollme", "rschaosid", "rss_feed", "rubycointipbot", "rule34", "rule_bot",
    "rusetipbot", "samacharbot2", "sentimentviewbot", "serendipitybot", "shadowbanbot",
    "sissyboi333", "slapbot", "slickwom-bot", "snapshot_bot", "soccer_gif_bot", "softwareswap_bot",
    "sports_gif_bot", "spursgifs_xposterbot", "stats-bot", "steam_bot", "subredditreports.csv",
    "subtext-bot", "synonym_flash", "tabledresser", "techobot", "tennis_gif_bot", "test_bot0x00",
    "thankyoubot", "tipmoonbot1", "tipmoonbot2", "tips_bot", "tittietipbot", "topcoin_tip",
    "topredditbot", "totes_meta_bot", "ttumblrbots", "unitconvert", "untouchedURL", "valkyribot",
    "versebot", "vertcoinbot", "vertcointipbot", "wheres_the_karma_bot", "wooshbot",
    "wtf_content_bot", "xkcd_bot", "xkcd_number_bot", "xkcd_transcriber", "xkcdcomic_bot",
    "yes_it_is_weird", "yourebot",
];

/// Classifies account names as bots. Names caught by a heuristic are remembered,
/// so a later lookup of the same name is answered from the known set.
///
/// One classifier per filter run; it is not shared between runs.
#[derive(Clone, Debug)]
pub struct BotClassifier {
    known: AHashSet<String>,
    heuristic_runs: u64,
    learned: u64,
}

impl Default for BotClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BotClassifier {
    /// Seeded with [`KNOWN_BOT_NAMES`].
    pub fn new() -> Self {
        Self {
            known: KNOWN_BOT_NAMES.iter().map(|s| s.to_string()).collect(),
            heuristic_runs: 0,
            learned: 0,
        }
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add names from the environment:
    /// - `RPREP_EXTRA_BOTS`: comma/semicolon/space separated names
    /// - `RPREP_EXTRA_BOTS_FILE`: path to a newline-separated file of names
    pub fn with_env_extras(mut self) -> Self {
        if let Ok(s) = std::env::var("RPREP_EXTRA_BOTS") {
            for raw in s.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
                let n = raw.trim();
                if !n.is_empty() {
                    self.known.insert(n.to_string());
                }
            }
        }
        if let Ok(path) = std::env::var("RPREP_EXTRA_BOTS_FILE") {
            if !path.trim().is_empty() {
                match File::open(&path) {
                    Ok(f) => {
                        for line in BufReader::new(f).lines().map_while(Result::ok) {
                            let n = line.trim();
                            if !n.is_empty() {
                                self.known.insert(n.to_string());
                            }
                        }
                    }
                    Err(e) => tracing::warn!("RPREP_EXTRA_BOTS_FILE is set but cannot be opened: {path}: {e}"),
                }
            }
        }
        self
    }

    /// Known name, or a heuristic hit (which is then remembered).
    pub fn is_bot(&mut self, name: &str) -> bool {
        if self.known.contains(name) {
            return true;
        }
        self.heuristic_runs += 1;
        if looks_like_bot(name) {
            self.known.insert(name.to_string());
            self.learned += 1;
            return true;
        }
        false
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// How many times the heuristic battery has been evaluated.
    pub fn heuristic_runs(&self) -> u64 {
        self.heuristic_runs
    }

    /// Names added by the heuristics during this run.
    pub fn learned(&self) -> u64 {
        self.learned
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Sorted snapshot of the known set, for persisting alongside the user set.
    pub fn known_names(&self) -> Vec<String> {
        let mut v: Vec<String> = self.known.iter().cloned().collect();
        v.sort_unstable();
        v
    }
}

/// Name-shape rules: `_SS` suffix, `bot` suffix, `_bot` / `-bot` anywhere, `auto`
/// prefix, and `moderator` / `moderation` anywhere. All but `_SS` ignore case.
pub fn looks_like_bot(name: &str) -> bool {
    if name.ends_with("_SS") {
        return true;
    }
    let lower = name.to_lowercase();
    lower.ends_with("bot")
        || lower.contains("_bot")
        || lower.contains("-bot")
        || lower.starts_with("auto")
        || lower.contains("moderator")
        || lower.contains("moderation")
}
