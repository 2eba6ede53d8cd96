use std::fmt;

macro_rules! services {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)+) => {
        /// A logical QMI service.
        ///
        /// Each service is an independent protocol namespace with its own
        /// message codes. Codes not in the table decode to
        /// [`Service::Unknown`] so unrecognized services never break frame
        /// parsing.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Service {
            $($(#[$doc])* $name,)+
            /// A service code this crate does not know about.
            Unknown(u8),
        }

        impl Service {
            /// The on-wire service code.
            pub fn code(self) -> u8 {
                match self {
                    $(Service::$name => $code,)+
                    Service::Unknown(code) => code,
                }
            }

            /// Look up a service by its on-wire code.
            pub fn from_code(code: u8) -> Self {
                match code {
                    $($code => Service::$name,)+
                    other => Service::Unknown(other),
                }
            }
        }
    };
}

services! {
    /// Client handle allocation and endpoint control.
    Control = 0,
    /// Wireless data service.
    Wds = 1,
    /// Device management service.
    Dms = 2,
    /// Network access service.
    Nas = 3,
    Qos = 4,
    /// Wireless messaging service.
    Wms = 5,
    Pds = 6,
    Auth = 7,
    At = 8,
    Voice = 9,
    Cat2 = 10,
    /// User identity module (SIM access) service.
    Uim = 11,
    /// Phonebook management service.
    Pbm = 12,
    Qchat = 13,
    Rmtfs = 14,
    Test = 15,
    Loc = 16,
    Sar = 17,
    Imss = 18,
    Adc = 19,
    Csd = 20,
    Mfs = 21,
    Time = 22,
    Ts = 23,
    Tmd = 24,
    /// SIM access profile service (Bluetooth SAP transport).
    Sap = 25,
    Wda = 26,
    Tsync = 27,
    Rfsa = 28,
    Csvt = 29,
    Qcmap = 30,
    Imsp = 31,
    Imsvt = 32,
    Imsa = 33,
    Coex = 34,
    Pdc = 36,
    Stx = 38,
    Bit = 39,
    Imsrtp = 40,
    Rfrpe = 41,
    Dsd = 42,
    Ssctl = 43,
    /// Card application toolkit service.
    Cat = 224,
    Rms = 225,
    Oma = 226,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{:?}({})", other, other.code()),
        }
    }
}
