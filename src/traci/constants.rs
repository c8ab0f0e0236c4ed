// TraCI command identifiers.
pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_CLOSE: u8 = 0x7F;

pub const CMD_GET_TL_VARIABLE: u8 = 0xA2;
pub const CMD_GET_VEHICLE_VARIABLE: u8 = 0xA4;
pub const CMD_GET_JUNCTION_VARIABLE: u8 = 0xA9;
pub const CMD_GET_SIM_VARIABLE: u8 = 0xAB;

/// Responses to GET commands carry the request id plus this offset.
pub const RESPONSE_OFFSET: u8 = 0x10;

// Variables.
pub const TRACI_ID_LIST: u8 = 0x00;
pub const TL_RED_YELLOW_GREEN_STATE: u8 = 0x20;
pub const VAR_POSITION: u8 = 0x42;
pub const VAR_MIN_EXPECTED_VEHICLES: u8 = 0x7D;

// Data types.
pub const POSITION_2D: u8 = 0x01;
pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0B;
pub const TYPE_STRING: u8 = 0x0C;
pub const TYPE_STRINGLIST: u8 = 0x0E;

// Status codes.
pub const RTYPE_OK: u8 = 0x00;
pub const RTYPE_ERR: u8 = 0xFF;
