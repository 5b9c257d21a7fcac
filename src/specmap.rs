use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const SCALAR_TYPE: &str = "";
pub const LIST_TYPE: &str = "list";
pub const BROADCAST_MESSAGE_TYPE: &str = "broadcast_msg";

/// How one positional element of a legacy record maps onto the canonical block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArgumentDescriptor {
    Input {
        #[serde(rename = "inputName")]
        name: String,
        #[serde(rename = "inputOp", default, skip_serializing_if = "Option::is_none")]
        shadow: Option<String>,
    },
    Field {
        #[serde(rename = "fieldName")]
        name: String,
        #[serde(rename = "variableType", default, skip_serializing_if = "Option::is_none")]
        variable_type: Option<String>,
    },
    /// Consumes a position without producing anything (the signature of a `call`).
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeSpec {
    pub opcode: String,
    #[serde(rename = "argMap", default)]
    pub arg_map: Vec<ArgumentDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct SpecMap {
    entries: HashMap<String, OpcodeSpec>,
}

impl SpecMap {
    pub fn get(&self, legacy_opcode: &str) -> Option<&OpcodeSpec> {
        self.entries.get(legacy_opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, legacy_opcode: &str, spec: OpcodeSpec) {
        self.entries.insert(legacy_opcode.to_string(), spec);
    }

    /// Parses a table shaped like `{"forward:": {"opcode": "...", "argMap": [...]}}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: HashMap<String, OpcodeSpec> =
            serde_json::from_str(text).context("Invalid opcode table JSON.")?;
        Ok(Self { entries })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read opcode table '{}'.", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Opcode table '{}' could not be parsed.", path.display()))
    }

    pub fn extend(&mut self, other: SpecMap) {
        self.entries.extend(other.entries);
    }

    pub fn builtin() -> Self {
        let mut map = Self::default();
        for (legacy, opcode, arg_map) in builtin_entries() {
            map.insert(
                legacy,
                OpcodeSpec {
                    opcode: opcode.to_string(),
                    arg_map,
                },
            );
        }
        map
    }
}

fn input(name: &str, shadow: &str) -> ArgumentDescriptor {
    ArgumentDescriptor::Input {
        name: name.to_string(),
        shadow: Some(shadow.to_string()),
    }
}

fn slot(name: &str) -> ArgumentDescriptor {
    ArgumentDescriptor::Input {
        name: name.to_string(),
        shadow: None,
    }
}

fn field(name: &str) -> ArgumentDescriptor {
    ArgumentDescriptor::Field {
        name: name.to_string(),
        variable_type: None,
    }
}

fn typed_field(name: &str, variable_type: &str) -> ArgumentDescriptor {
    ArgumentDescriptor::Field {
        name: name.to_string(),
        variable_type: Some(variable_type.to_string()),
    }
}

fn num(name: &str) -> ArgumentDescriptor {
    input(name, "math_number")
}

fn text(name: &str) -> ArgumentDescriptor {
    input(name, "text")
}

fn builtin_entries() -> Vec<(&'static str, &'static str, Vec<ArgumentDescriptor>)> {
    vec![
        // motion
        ("forward:", "motion_movesteps", vec![num("STEPS")]),
        ("turnRight:", "motion_turnright", vec![num("DEGREES")]),
        ("turnLeft:", "motion_turnleft", vec![num("DEGREES")]),
        ("heading:", "motion_pointindirection", vec![input("DIRECTION", "math_angle")]),
        ("pointTowards:", "motion_pointtowards", vec![input("TOWARDS", "motion_pointtowards_menu")]),
        ("gotoX:y:", "motion_gotoxy", vec![num("X"), num("Y")]),
        ("gotoSpriteOrMouse:", "motion_goto", vec![input("TO", "motion_goto_menu")]),
        ("glideSecs:toX:y:elapsed:from:", "motion_glidesecstoxy", vec![num("SECS"), num("X"), num("Y")]),
        ("changeXposBy:", "motion_changexby", vec![num("DX")]),
        ("xpos:", "motion_setx", vec![num("X")]),
        ("changeYposBy:", "motion_changeyby", vec![num("DY")]),
        ("ypos:", "motion_sety", vec![num("Y")]),
        ("bounceOffEdge", "motion_ifonedgebounce", vec![]),
        ("setRotationStyle", "motion_setrotationstyle", vec![field("STYLE")]),
        ("xpos", "motion_xposition", vec![]),
        ("ypos", "motion_yposition", vec![]),
        ("heading", "motion_direction", vec![]),
        ("scrollRight", "motion_scroll_right", vec![num("DISTANCE")]),
        ("scrollUp", "motion_scroll_up", vec![num("DISTANCE")]),
        ("scrollAlign", "motion_align_scene", vec![field("ALIGNMENT")]),
        ("xScroll", "motion_xscroll", vec![]),
        ("yScroll", "motion_yscroll", vec![]),
        // looks
        ("say:duration:elapsed:from:", "looks_sayforsecs", vec![text("MESSAGE"), num("SECS")]),
        ("say:", "looks_say", vec![text("MESSAGE")]),
        ("think:duration:elapsed:from:", "looks_thinkforsecs", vec![text("MESSAGE"), num("SECS")]),
        ("think:", "looks_think", vec![text("MESSAGE")]),
        ("show", "looks_show", vec![]),
        ("hide", "looks_hide", vec![]),
        ("hideAll", "looks_hideallsprites", vec![]),
        ("lookLike:", "looks_switchcostumeto", vec![input("COSTUME", "looks_costume")]),
        ("nextCostume", "looks_nextcostume", vec![]),
        ("startScene", "looks_switchbackdropto", vec![input("BACKDROP", "looks_backdrops")]),
        ("startSceneAndWait", "looks_switchbackdroptoandwait", vec![input("BACKDROP", "looks_backdrops")]),
        ("nextScene", "looks_nextbackdrop", vec![]),
        ("changeGraphicEffect:by:", "looks_changeeffectby", vec![field("EFFECT"), num("CHANGE")]),
        ("setGraphicEffect:to:", "looks_seteffectto", vec![field("EFFECT"), num("VALUE")]),
        ("filterReset", "looks_cleargraphiceffects", vec![]),
        ("changeSizeBy:", "looks_changesizeby", vec![num("CHANGE")]),
        ("setSizeTo:", "looks_setsizeto", vec![num("SIZE")]),
        ("changeStretchBy:", "looks_changestretchby", vec![num("CHANGE")]),
        ("setStretchTo:", "looks_setstretchto", vec![num("STRETCH")]),
        ("comeToFront", "looks_gotofrontback", vec![]),
        ("goBackByLayers:", "looks_goforwardbackward", vec![input("NUM", "math_integer")]),
        ("costumeIndex", "looks_costumenumbername", vec![]),
        ("costumeName", "looks_costumenumbername", vec![]),
        ("sceneName", "looks_backdropnumbername", vec![]),
        ("backgroundIndex", "looks_backdropnumbername", vec![]),
        ("scale", "looks_size", vec![]),
        // sound and music
        ("playSound:", "sound_play", vec![input("SOUND_MENU", "sound_sounds_menu")]),
        ("doPlaySoundAndWait", "sound_playuntildone", vec![input("SOUND_MENU", "sound_sounds_menu")]),
        ("stopAllSounds", "sound_stopallsounds", vec![]),
        ("changeVolumeBy:", "sound_changevolumeby", vec![num("VOLUME")]),
        ("setVolumeTo:", "sound_setvolumeto", vec![num("VOLUME")]),
        ("volume", "sound_volume", vec![]),
        ("playDrum", "music_playDrumForBeats", vec![input("DRUM", "music_menu_DRUM"), num("BEATS")]),
        ("drum:duration:elapsed:from:", "music_midiPlayDrumForBeats", vec![num("DRUM"), num("BEATS")]),
        ("rest:elapsed:from:", "music_restForBeats", vec![num("BEATS")]),
        ("noteOn:duration:elapsed:from:", "music_playNoteForBeats", vec![input("NOTE", "note"), num("BEATS")]),
        ("instrument:", "music_setInstrument", vec![input("INSTRUMENT", "music_menu_INSTRUMENT")]),
        ("midiInstrument:", "music_midiSetInstrument", vec![num("INSTRUMENT")]),
        ("changeTempoBy:", "music_changeTempo", vec![num("TEMPO")]),
        ("setTempoTo:", "music_setTempo", vec![num("TEMPO")]),
        ("tempo", "music_getTempo", vec![]),
        // pen
        ("clearPenTrails", "pen_clear", vec![]),
        ("stampCostume", "pen_stamp", vec![]),
        ("putPenDown", "pen_penDown", vec![]),
        ("putPenUp", "pen_penUp", vec![]),
        ("penColor:", "pen_setPenColorToColor", vec![input("COLOR", "colour_picker")]),
        ("changePenHueBy:", "pen_changePenHueBy", vec![num("HUE")]),
        ("setPenHueTo:", "pen_setPenHueToNumber", vec![num("HUE")]),
        ("changePenShadeBy:", "pen_changePenShadeBy", vec![num("SHADE")]),
        ("setPenShadeTo:", "pen_setPenShadeToNumber", vec![num("SHADE")]),
        ("changePenSizeBy:", "pen_changePenSizeBy", vec![num("SIZE")]),
        ("penSize:", "pen_setPenSizeTo", vec![num("SIZE")]),
        // events
        ("whenGreenFlag", "event_whenflagclicked", vec![]),
        ("whenKeyPressed", "event_whenkeypressed", vec![field("KEY_OPTION")]),
        ("whenClicked", "event_whenthisspriteclicked", vec![]),
        ("whenSceneStarts", "event_whenbackdropswitchesto", vec![field("BACKDROP")]),
        ("whenSensorGreaterThan", "event_whengreaterthan", vec![field("WHENGREATERTHANMENU"), num("VALUE")]),
        ("whenIReceive", "event_whenbroadcastreceived", vec![typed_field("BROADCAST_OPTION", BROADCAST_MESSAGE_TYPE)]),
        ("broadcast:", "event_broadcast", vec![input("BROADCAST_INPUT", "event_broadcast_menu")]),
        ("doBroadcastAndWait", "event_broadcastandwait", vec![input("BROADCAST_INPUT", "event_broadcast_menu")]),
        // control
        ("wait:elapsed:from:", "control_wait", vec![input("DURATION", "math_positive_number")]),
        ("doRepeat", "control_repeat", vec![input("TIMES", "math_whole_number"), slot("SUBSTACK")]),
        ("doForever", "control_forever", vec![slot("SUBSTACK")]),
        ("doIf", "control_if", vec![slot("CONDITION"), slot("SUBSTACK")]),
        ("doIfElse", "control_if_else", vec![slot("CONDITION"), slot("SUBSTACK"), slot("SUBSTACK2")]),
        ("doWaitUntil", "control_wait_until", vec![slot("CONDITION")]),
        ("doUntil", "control_repeat_until", vec![slot("CONDITION"), slot("SUBSTACK")]),
        ("doWhile", "control_while", vec![slot("CONDITION"), slot("SUBSTACK")]),
        ("doForLoop", "control_for_each", vec![typed_field("VARIABLE", SCALAR_TYPE), text("VALUE"), slot("SUBSTACK")]),
        ("warpSpeed", "control_all_at_once", vec![slot("SUBSTACK")]),
        ("stopScripts", "control_stop", vec![field("STOP_OPTION")]),
        ("whenCloned", "control_start_as_clone", vec![]),
        ("createCloneOf", "control_create_clone_of", vec![input("CLONE_OPTION", "control_create_clone_of_menu")]),
        ("deleteClone", "control_delete_this_clone", vec![]),
        ("COUNT", "control_get_counter", vec![]),
        ("INCR_COUNT", "control_incr_counter", vec![]),
        ("CLR_COUNT", "control_clear_counter", vec![]),
        // sensing
        ("touching:", "sensing_touchingobject", vec![input("TOUCHINGOBJECTMENU", "sensing_touchingobjectmenu")]),
        ("touchingColor:", "sensing_touchingcolor", vec![input("COLOR", "colour_picker")]),
        ("color:sees:", "sensing_coloristouchingcolor", vec![input("COLOR", "colour_picker"), input("COLOR2", "colour_picker")]),
        ("distanceTo:", "sensing_distanceto", vec![input("DISTANCETOMENU", "sensing_distancetomenu")]),
        ("doAsk", "sensing_askandwait", vec![text("QUESTION")]),
        ("answer", "sensing_answer", vec![]),
        ("keyPressed:", "sensing_keypressed", vec![input("KEY_OPTION", "sensing_keyoptions")]),
        ("mousePressed", "sensing_mousedown", vec![]),
        ("mouseX", "sensing_mousex", vec![]),
        ("mouseY", "sensing_mousey", vec![]),
        ("soundLevel", "sensing_loudness", vec![]),
        ("isLoud", "sensing_loud", vec![]),
        ("senseVideoMotion", "videoSensing_videoOn", vec![input("ATTRIBUTE", "videoSensing_menu_ATTRIBUTE"), input("SUBJECT", "videoSensing_menu_SUBJECT")]),
        ("setVideoState", "videoSensing_videoToggle", vec![input("VIDEO_STATE", "videoSensing_menu_VIDEO_STATE")]),
        ("setVideoTransparency", "videoSensing_setVideoTransparency", vec![num("TRANSPARENCY")]),
        ("timer", "sensing_timer", vec![]),
        ("timerReset", "sensing_resettimer", vec![]),
        ("getAttribute:of:", "sensing_of", vec![field("PROPERTY"), input("OBJECT", "sensing_of_object_menu")]),
        ("timeAndDate", "sensing_current", vec![field("CURRENTMENU")]),
        ("timestamp", "sensing_dayssince2000", vec![]),
        ("getUserName", "sensing_username", vec![]),
        // operators
        ("+", "operator_add", vec![num("NUM1"), num("NUM2")]),
        ("-", "operator_subtract", vec![num("NUM1"), num("NUM2")]),
        ("*", "operator_multiply", vec![num("NUM1"), num("NUM2")]),
        ("/", "operator_divide", vec![num("NUM1"), num("NUM2")]),
        ("randomFrom:to:", "operator_random", vec![num("FROM"), num("TO")]),
        ("<", "operator_lt", vec![text("OPERAND1"), text("OPERAND2")]),
        ("=", "operator_equals", vec![text("OPERAND1"), text("OPERAND2")]),
        (">", "operator_gt", vec![text("OPERAND1"), text("OPERAND2")]),
        ("&", "operator_and", vec![slot("OPERAND1"), slot("OPERAND2")]),
        ("|", "operator_or", vec![slot("OPERAND1"), slot("OPERAND2")]),
        ("not", "operator_not", vec![slot("OPERAND")]),
        ("concatenate:with:", "operator_join", vec![text("STRING1"), text("STRING2")]),
        ("letter:of:", "operator_letter_of", vec![input("LETTER", "math_whole_number"), text("STRING")]),
        ("stringLength:", "operator_length", vec![text("STRING")]),
        ("%", "operator_mod", vec![num("NUM1"), num("NUM2")]),
        ("rounded", "operator_round", vec![num("NUM")]),
        ("computeFunction:of:", "operator_mathop", vec![field("OPERATOR"), num("NUM")]),
        // data
        ("readVariable", "data_variable", vec![typed_field("VARIABLE", SCALAR_TYPE)]),
        ("setVar:to:", "data_setvariableto", vec![typed_field("VARIABLE", SCALAR_TYPE), text("VALUE")]),
        ("changeVar:by:", "data_changevariableby", vec![typed_field("VARIABLE", SCALAR_TYPE), num("VALUE")]),
        ("showVariable:", "data_showvariable", vec![typed_field("VARIABLE", SCALAR_TYPE)]),
        ("hideVariable:", "data_hidevariable", vec![typed_field("VARIABLE", SCALAR_TYPE)]),
        ("contentsOfList:", "data_listcontents", vec![typed_field("LIST", LIST_TYPE)]),
        ("append:toList:", "data_addtolist", vec![text("ITEM"), typed_field("LIST", LIST_TYPE)]),
        ("deleteLine:ofList:", "data_deleteoflist", vec![input("INDEX", "math_integer"), typed_field("LIST", LIST_TYPE)]),
        ("insert:at:ofList:", "data_insertatlist", vec![text("ITEM"), input("INDEX", "math_integer"), typed_field("LIST", LIST_TYPE)]),
        ("setLine:ofList:to:", "data_replaceitemoflist", vec![input("INDEX", "math_integer"), typed_field("LIST", LIST_TYPE), text("ITEM")]),
        ("getLine:ofList:", "data_itemoflist", vec![input("INDEX", "math_integer"), typed_field("LIST", LIST_TYPE)]),
        ("lineCountOfList:", "data_lengthoflist", vec![typed_field("LIST", LIST_TYPE)]),
        ("list:contains:", "data_listcontainsitem", vec![typed_field("LIST", LIST_TYPE), text("ITEM")]),
        ("showList:", "data_showlist", vec![typed_field("LIST", LIST_TYPE)]),
        ("hideList:", "data_hidelist", vec![typed_field("LIST", LIST_TYPE)]),
        // procedures
        ("procDef", "procedures_definition", vec![]),
        ("call", "procedures_call", vec![]),
        ("getParam", "argument_reporter_string_number", vec![field("VALUE")]),
    ]
}
