use std::fmt;

macro_rules! error_codes {
    ($($name:ident = $value:literal,)+) => {
        /// A named QMI result code, as carried in the mandatory result
        /// parameter (type 0x02) of every response.
        ///
        /// Values not in the table map to [`ErrorCode::Unrecognized`],
        /// preserving the raw code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $($name,)+
            /// An error value this crate does not know about.
            Unrecognized(u16),
        }

        impl ErrorCode {
            /// The on-wire error value.
            pub fn value(self) -> u16 {
                match self {
                    $(ErrorCode::$name => $value,)+
                    ErrorCode::Unrecognized(value) => value,
                }
            }

            /// Look up an error code by its on-wire value.
            pub fn from_value(value: u16) -> Self {
                match value {
                    $($value => ErrorCode::$name,)+
                    other => ErrorCode::Unrecognized(other),
                }
            }
        }
    };
}

error_codes! {
    None = 0,
    MalformedMessage = 1,
    NoMemory = 2,
    Internal = 3,
    Aborted = 4,
    ClientIdsExhausted = 5,
    UnabortableTransaction = 6,
    InvalidClientId = 7,
    NoThresholdsProvided = 8,
    InvalidHandle = 9,
    InvalidProfile = 10,
    InvalidPinId = 11,
    IncorrectPin = 12,
    NoNetworkFound = 13,
    CallFailed = 14,
    OutOfCall = 15,
    NotProvisioned = 16,
    MissingArgument = 17,
    ArgumentTooLong = 19,
    InvalidTransactionId = 22,
    DeviceInUse = 23,
    NetworkUnsupported = 24,
    DeviceUnsupported = 25,
    NoEffect = 26,
    NoFreeProfile = 27,
    InvalidPdpType = 28,
    InvalidTechnologyPreference = 29,
    InvalidProfileType = 30,
    InvalidServiceType = 31,
    InvalidRegisterAction = 32,
    InvalidPsAttachAction = 33,
    AuthenticationFailed = 34,
    PinBlocked = 35,
    PinAlwaysBlocked = 36,
    UimUninitialized = 37,
    MaximumQosRequestsInUse = 38,
    IncorrectFlowFilter = 39,
    NetworkQosUnaware = 40,
    InvalidQosId = 41,
    RequestedNumberUnsupported = 42,
    InterfaceNotFound = 43,
    FlowSuspended = 44,
    InvalidDataFormat = 45,
    GeneralError = 46,
    UnknownError = 47,
    InvalidArgument = 48,
    InvalidIndex = 49,
    NoEntry = 50,
    DeviceStorageFull = 51,
    DeviceNotReady = 52,
    NetworkNotReady = 53,
    WmsCauseCode = 54,
    WmsMessageNotSent = 55,
    WmsMessageDeliveryFailure = 56,
    WmsInvalidMessageId = 57,
    WmsEncoding = 58,
    AuthenticationLock = 59,
    InvalidTransition = 60,
    NotMcastInterface = 61,
    MaximumMcastRequestsInUse = 62,
    InvalidMcastHandle = 63,
    InvalidIpFamilyPreference = 64,
    SessionInactive = 65,
    SessionInvalid = 66,
    SessionOwnership = 67,
    InsufficientResources = 68,
    Disabled = 69,
    InvalidOperation = 70,
    InvalidQmiCommand = 71,
    WmsTpduType = 72,
    WmsSmscAddress = 73,
    InformationUnavailable = 74,
    SegmentTooLong = 75,
    SegmentOrder = 76,
    BundlingNotSupported = 77,
    OperationPartialFailure = 78,
    PolicyMismatch = 79,
    SimFileNotFound = 80,
    ExtendedInternal = 81,
    AccessDenied = 82,
    HardwareRestricted = 83,
    AckNotSent = 84,
    InjectTimeout = 85,
    IncompatibleState = 90,
    FdnRestrict = 91,
    SupsFailureCause = 92,
    NoRadio = 93,
    NotSupported = 94,
    NoSubscription = 95,
    CardCallControlFailed = 96,
    NetworkAborted = 97,
    MsgBlocked = 98,
    InvalidSessionType = 100,
    InvalidPbType = 101,
    NoSim = 102,
    PbNotReady = 103,
    PinRestriction = 104,
    Pin2Restriction = 105,
    PukRestriction = 106,
    Puk2Restriction = 107,
    PbAccessRestricted = 108,
    PbDeleteInProgress = 109,
    PbTextTooLong = 110,
    PbNumberTooLong = 111,
    PbHiddenKeyRestriction = 112,
    PbNotAvailable = 113,
    CatEventRegistrationFailed = 61441,
    CatInvalidTerminalResponse = 61442,
    CatInvalidEnvelopeCommand = 61443,
    CatEnvelopeCommandBusy = 61444,
    CatEnvelopeCommandFailed = 61445,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Unrecognized(value) => write!(f, "unrecognized error {value}"),
            other => write!(f, "{:?} ({})", other, other.value()),
        }
    }
}
